use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::client::{ApiCall, ApiRequest};
use crate::error::DeliveryError;

const DETAIL_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    AlreadyExists,
    PermanentFailure,
    TransientFailure,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPolicy {
    pub success: Vec<u16>,
    pub already_exists: Vec<u16>,
    pub permanent: Vec<u16>,
    pub transient: Vec<u16>,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            success: vec![200, 201, 202, 204],
            already_exists: vec![409],
            permanent: vec![400, 401, 403, 404, 405, 410, 422],
            transient: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl StatusPolicy {
    pub fn classify(&self, status: u16) -> StatusClass {
        if self.success.contains(&status) {
            StatusClass::Success
        } else if self.already_exists.contains(&status) {
            StatusClass::AlreadyExists
        } else if self.permanent.contains(&status) {
            StatusClass::PermanentFailure
        } else if self.transient.contains(&status) {
            StatusClass::TransientFailure
        } else {
            StatusClass::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a request is sent at most `max_retries + 1` times.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// A request together with the input records it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub records: Vec<String>,
    pub request: ApiRequest,
}

impl PreparedRequest {
    pub fn single(record: impl Into<String>, request: ApiRequest) -> Self {
        Self {
            records: vec![record.into()],
            request,
        }
    }

    pub fn label(&self) -> String {
        match self.records.as_slice() {
            [] => "<empty request>".to_string(),
            [only] => only.clone(),
            [first, rest @ ..] => format!("{first} (+{} more)", rest.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOutcome {
    Succeeded,
    Exists,
    Failed,
}

impl RecordOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOutcome::Succeeded => "succeeded",
            RecordOutcome::Exists => "exists",
            RecordOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordStatus {
    pub record: String,
    pub outcome: RecordOutcome,
    pub http_status: Option<u16>,
    pub attempts: u32,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub records: Vec<RecordStatus>,
}

impl BatchResult {
    fn apply(
        &mut self,
        prepared: &PreparedRequest,
        outcome: RecordOutcome,
        http_status: Option<u16>,
        attempts: u32,
        detail: &str,
    ) {
        let detail = truncate_detail(detail);
        for record in &prepared.records {
            self.submitted += 1;
            match outcome {
                RecordOutcome::Succeeded | RecordOutcome::Exists => self.succeeded += 1,
                RecordOutcome::Failed => self.failed += 1,
            }
            self.records.push(RecordStatus {
                record: record.clone(),
                outcome,
                http_status,
                attempts,
                detail: detail.clone(),
            });
        }
    }
}

enum Attempt {
    Status(u16, String),
    Transport(String),
}

#[derive(Debug, Clone, Default)]
pub struct BatchSubmitter {
    pub status: StatusPolicy,
    pub retry: RetryPolicy,
}

impl BatchSubmitter {
    pub fn new(status: StatusPolicy, retry: RetryPolicy) -> Self {
        Self { status, retry }
    }

    /// Sends each request in order. Per-record failures are recorded; retry
    /// exhaustion and unrecognized statuses abort the whole batch.
    pub fn submit(
        &self,
        requests: &[PreparedRequest],
        caller: &dyn ApiCall,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, DeliveryError> {
        let mut result = BatchResult::default();
        let total = requests.len();

        for (idx, prepared) in requests.iter().enumerate() {
            let label = prepared.label();
            sink.event(ProgressEvent {
                message: format!("phase=Submit; [{}/{total}] {label}", idx + 1),
                elapsed: None,
            });

            let mut attempts = 0u32;
            loop {
                attempts += 1;
                let attempt = match caller.call(&prepared.request) {
                    Ok(response) => Attempt::Status(response.status, response.body),
                    Err(DeliveryError::Http(message)) => Attempt::Transport(message),
                    Err(err) => return Err(err),
                };

                let (class, status, body) = match attempt {
                    Attempt::Status(status, body) => (self.status.classify(status), Some(status), body),
                    Attempt::Transport(message) => (StatusClass::TransientFailure, None, message),
                };

                match class {
                    StatusClass::Success => {
                        result.apply(prepared, RecordOutcome::Succeeded, status, attempts, "");
                        break;
                    }
                    StatusClass::AlreadyExists => {
                        tracing::info!(record = %label, "already exists, treating as success");
                        result.apply(prepared, RecordOutcome::Exists, status, attempts, &body);
                        break;
                    }
                    StatusClass::PermanentFailure => {
                        tracing::warn!(record = %label, status = ?status, body = %body, "request failed");
                        sink.event(ProgressEvent {
                            message: format!(
                                "failed {label} status={}: {body}",
                                status.map(|code| code.to_string()).unwrap_or_default()
                            ),
                            elapsed: None,
                        });
                        result.apply(prepared, RecordOutcome::Failed, status, attempts, &body);
                        break;
                    }
                    StatusClass::TransientFailure => {
                        if attempts > self.retry.max_retries {
                            tracing::error!(record = %label, attempts, body = %body, "retries exhausted");
                            return Err(DeliveryError::RetriesExhausted {
                                record: label,
                                attempts,
                                status,
                                body,
                                succeeded: result.succeeded,
                                failed: result.failed,
                            });
                        }
                        tracing::warn!(
                            record = %label,
                            status = ?status,
                            retry = attempts,
                            max_retries = self.retry.max_retries,
                            "transient failure, retrying"
                        );
                        sink.event(ProgressEvent {
                            message: format!(
                                "retry {attempts}/{} for {label} in {:?}",
                                self.retry.max_retries, self.retry.delay
                            ),
                            elapsed: None,
                        });
                        thread::sleep(self.retry.delay);
                    }
                    StatusClass::Unknown => {
                        tracing::error!(record = %label, status = ?status, body = %body, "unexpected status");
                        return Err(DeliveryError::UnexpectedStatus {
                            record: label,
                            status: status.unwrap_or_default(),
                            body,
                            succeeded: result.succeeded,
                            failed: result.failed,
                        });
                    }
                }
            }
        }

        Ok(result)
    }
}

fn truncate_detail(detail: &str) -> String {
    let flat = detail.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= DETAIL_LIMIT {
        return flat;
    }
    let mut cut = flat.chars().take(DETAIL_LIMIT).collect::<String>();
    cut.push_str("...");
    cut
}
