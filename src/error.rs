use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DeliveryError {
    #[error("invalid workspace reference (expected namespace/name): {0}")]
    InvalidWorkspace(String),

    #[error("invalid object URI (expected gs://bucket/object): {0}")]
    InvalidObjectUri(String),

    #[error("invalid access level: {0}")]
    InvalidAccessLevel(String),

    #[error("invalid entity header (expected entity:<type>_id): {0}")]
    InvalidEntityHeader(String),

    #[error("invalid boolean value in column {column}: {value}")]
    InvalidBool { column: String, value: String },

    #[error("input is missing required column: {0}")]
    MissingColumn(String),

    #[error("row {row}: missing value for column {column}")]
    MissingValue { row: usize, column: String },

    #[error("unsupported input file type: {0}")]
    UnsupportedInput(PathBuf),

    #[error("failed to read table {path}: {message}")]
    TableRead { path: PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("credential acquisition failed: {0}")]
    Credentials(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error(
        "{record}: gave up after {attempts} attempts (last status {status:?}): {body} \
         [{succeeded} succeeded, {failed} failed before abort]"
    )]
    #[diagnostic(help("the service kept returning transient errors; inspect the body and rerun"))]
    RetriesExhausted {
        record: String,
        attempts: u32,
        status: Option<u16>,
        body: String,
        succeeded: usize,
        failed: usize,
    },

    #[error(
        "{record}: unexpected status {status}: {body} \
         [{succeeded} succeeded, {failed} failed before abort]"
    )]
    #[diagnostic(help("the batch was halted so the response can be inspected"))]
    UnexpectedStatus {
        record: String,
        status: u16,
        body: String,
        succeeded: usize,
        failed: usize,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
