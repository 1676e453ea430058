use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;

use crate::error::DeliveryError;
use crate::submit::BatchResult;

pub const REPORT_COLUMNS: [&str; 5] = ["record", "outcome", "http_status", "attempts", "detail"];

const MAX_NAME_ATTEMPTS: usize = 100;

pub struct ReportWriter;

impl ReportWriter {
    /// Writes `{prefix}_{YYYYMMDD_HHMMSS}.tsv` under `dir` and returns its path.
    ///
    /// An existing report is never replaced; a same-second name gets a
    /// `_2`, `_3`, ... suffix.
    pub fn write(
        result: &BatchResult,
        dir: &Utf8Path,
        prefix: &str,
    ) -> Result<Utf8PathBuf, DeliveryError> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut temp = Self::render(result, dir)?;
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let path = match attempt {
                1 => dir.join(format!("{prefix}_{stamp}.tsv")),
                n => dir.join(format!("{prefix}_{stamp}_{n}.tsv")),
            };
            match temp.persist_noclobber(path.as_std_path()) {
                Ok(_) => {
                    tracing::info!(path = %path, rows = result.records.len(), "report written");
                    return Ok(path);
                }
                Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                    temp = err.file;
                }
                Err(err) => return Err(DeliveryError::Filesystem(err.error.to_string())),
            }
        }
        Err(DeliveryError::Filesystem(format!(
            "no free report name for {prefix}_{stamp} in {dir}"
        )))
    }

    /// Writes the report to `path`, replacing any existing file.
    pub fn write_to(result: &BatchResult, path: &Utf8Path) -> Result<(), DeliveryError> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        let temp = Self::render(result, parent)?;
        temp.persist(path.as_std_path())
            .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
        tracing::info!(path = %path, rows = result.records.len(), "report written");
        Ok(())
    }

    fn render(result: &BatchResult, dir: &Utf8Path) -> Result<NamedTempFile, DeliveryError> {
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("dtk-report")
            .tempfile_in(dir.as_std_path())
            .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(temp.as_file());
        writer
            .write_record(REPORT_COLUMNS)
            .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
        for status in &result.records {
            let http_status = status
                .http_status
                .map(|code| code.to_string())
                .unwrap_or_default();
            writer
                .write_record([
                    status.record.as_str(),
                    status.outcome.as_str(),
                    http_status.as_str(),
                    status.attempts.to_string().as_str(),
                    status.detail.as_str(),
                ])
                .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
        drop(writer);
        Ok(temp)
    }
}
