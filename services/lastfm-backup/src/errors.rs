//!
//! src/errors.rs  Andrew Belles  Oct 18th, 2026
//!
//! Defines enums and methods of error conversion
//! for errors the backup uses
//!
//!

use thiserror::Error;

use crate::sync::SyncReport;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl BackupError {
    /// Only network level failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, BackupError::Http(_))
    }
}

impl From<reqwest::Error> for BackupError {
    fn from(e: reqwest::Error) -> Self { BackupError::Http(e.to_string()) }
}

impl From<serde_json::Error> for BackupError {
    fn from(e: serde_json::Error) -> Self { BackupError::Malformed(e.to_string()) }
}

impl From<sqlx::Error> for BackupError {
    fn from(e: sqlx::Error) -> Self { BackupError::Db(e.to_string()) }
}

/// A partition sync that stopped early, along with whatever it
/// managed to persist before the error
#[derive(Error, Debug)]
#[error("sync aborted after {} processed / {} stored: {source}",
    .report.processed, .report.stored)]
pub struct SyncFailure {
    pub report: SyncReport,
    #[source]
    pub source: BackupError
}
