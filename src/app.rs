use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::client::ApiCall;
use crate::config::ResolvedConfig;
use crate::domain::WorkspaceRef;
use crate::error::DeliveryError;
use crate::report::ReportWriter;
use crate::submit::{
    BatchSubmitter, PreparedRequest, RecordOutcome, RecordStatus, StatusPolicy,
};
use crate::table::{Table, read_table};
use crate::templates;

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub command: String,
    pub input: String,
    pub requests: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub report_path: String,
    pub failures: Vec<RecordStatus>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: ApiCall> {
    config: ResolvedConfig,
    caller: C,
    submitter: BatchSubmitter,
}

impl<C: ApiCall> App<C> {
    pub fn new(config: ResolvedConfig, caller: C) -> Self {
        let submitter = BatchSubmitter::new(StatusPolicy::default(), config.retry);
        Self {
            config,
            caller,
            submitter,
        }
    }

    pub fn upsert_entities(
        &self,
        workspace: &WorkspaceRef,
        input: &Path,
        batch_size: Option<usize>,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, DeliveryError> {
        let batch_size = batch_size.unwrap_or(self.config.batch_size);
        if batch_size == 0 {
            return Err(DeliveryError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        self.run("upsert-entities", input, sink, |table| {
            templates::entity_upsert(&self.config.endpoints, workspace, table, batch_size)
        })
    }

    pub fn share_workspaces(
        &self,
        input: &Path,
        invite_users_not_found: bool,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, DeliveryError> {
        let invite = invite_users_not_found || self.config.invite_users_not_found;
        self.run("share-workspaces", input, sink, |table| {
            templates::workspace_acl(&self.config.endpoints, table, invite)
        })
    }

    pub fn grant_snapshot_access(
        &self,
        input: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, DeliveryError> {
        self.run("grant-snapshot-access", input, sink, |table| {
            templates::snapshot_members(&self.config.endpoints, table)
        })
    }

    pub fn check_objects(
        &self,
        input: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, DeliveryError> {
        self.run("check-objects", input, sink, |table| {
            templates::object_checks(&self.config.endpoints, table)
        })
    }

    pub fn run_queries(
        &self,
        input: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, DeliveryError> {
        self.run("run-queries", input, sink, |table| {
            templates::warehouse_queries(&self.config.endpoints, table)
        })
    }

    fn run<F>(
        &self,
        command: &str,
        input: &Path,
        sink: &dyn ProgressSink,
        build: F,
    ) -> Result<RunResult, DeliveryError>
    where
        F: FnOnce(&Table) -> Result<Vec<PreparedRequest>, DeliveryError>,
    {
        let start = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Read; {}", input.display()),
            elapsed: None,
        });
        let table = read_table(input)?;

        sink.event(ProgressEvent {
            message: format!("phase=Build; {} records", table.len()),
            elapsed: None,
        });
        if table.is_empty() {
            tracing::info!(input = %input.display(), "no rows found, nothing to submit");
        }
        // A zero-byte file has no header to validate against.
        let requests = if table.headers.is_empty() {
            Vec::new()
        } else {
            build(&table)?
        };
        tracing::debug!(command, requests = requests.len(), "requests built");

        let result = self.submitter.submit(&requests, &self.caller, sink)?;

        sink.event(ProgressEvent {
            message: "phase=Report; writing status table".to_string(),
            elapsed: None,
        });
        let report_path = ReportWriter::write(&result, &self.config.report_dir, command)?;

        sink.event(ProgressEvent {
            message: format!(
                "done succeeded={} failed={} total={}",
                result.succeeded, result.failed, result.submitted
            ),
            elapsed: Some(start.elapsed()),
        });

        Ok(RunResult {
            command: command.to_string(),
            input: input.display().to_string(),
            requests: requests.len(),
            total: result.submitted,
            succeeded: result.succeeded,
            failed: result.failed,
            report_path: report_path.to_string(),
            failures: result
                .records
                .into_iter()
                .filter(|status| status.outcome == RecordOutcome::Failed)
                .collect(),
        })
    }
}
