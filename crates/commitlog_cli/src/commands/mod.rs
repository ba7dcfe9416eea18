//! CLI command implementations.

pub mod consume;
pub mod dump;
pub mod inspect;
pub mod produce;
pub mod truncate;
pub mod verify;

use commitlog_core::{Config, CoreError, Log, Record};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The log failed.
    #[error("{0}")]
    Log(#[from] CoreError),

    /// JSON output failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No log directory at the given path.
    #[error("no log found at {0:?}")]
    NotFound(PathBuf),

    /// Verification found problems.
    #[error("verification failed with {0} problem(s)")]
    VerificationFailed(usize),
}

/// Segment settings taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Overrides the store cap.
    pub max_store_bytes: Option<u64>,
    /// Overrides the index cap.
    pub max_index_bytes: Option<u64>,
}

impl LogOptions {
    fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(size) = self.max_store_bytes {
            config = config.max_store_bytes(size);
        }
        if let Some(size) = self.max_index_bytes {
            config = config.max_index_bytes(size);
        }
        config
    }
}

/// Opens the log at `path`, which must already exist.
pub fn open_existing(path: &Path, options: &LogOptions) -> CliResult<Log> {
    if !path.is_dir() {
        return Err(CliError::NotFound(path.to_path_buf()));
    }
    open(path, options)
}

/// Opens the log at `path`, creating it if needed.
pub fn open(path: &Path, options: &LogOptions) -> CliResult<Log> {
    Ok(Log::open(path, options.config())?)
}

/// A record as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset of the record.
    pub offset: u64,
    /// Payload size in bytes.
    pub size: usize,
    /// Payload, lossily decoded as UTF-8.
    pub value: String,
}

impl From<&Record> for RecordInfo {
    fn from(record: &Record) -> Self {
        Self {
            offset: record.offset,
            size: record.value.len(),
            value: String::from_utf8_lossy(&record.value).into_owned(),
        }
    }
}

fn print_record(record: &RecordInfo) {
    println!("[{}] ({} bytes) {}", record.offset, record.size, record.value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn options_override_caps() {
        let options = LogOptions {
            max_store_bytes: Some(64),
            max_index_bytes: None,
        };
        let config = options.config();
        assert_eq!(config.segment.max_store_bytes, 64);
        assert_eq!(
            config.segment.max_index_bytes,
            Config::default().segment.max_index_bytes
        );
    }

    #[test]
    fn open_existing_requires_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            open_existing(&missing, &LogOptions::default()),
            Err(CliError::NotFound(_))
        ));
        assert!(!missing.exists());
    }

    #[test]
    fn record_info_is_lossy() {
        let record = Record {
            value: vec![b'o', b'k', 0xff],
            offset: 3,
        };
        let info = RecordInfo::from(&record);
        assert_eq!(info.offset, 3);
        assert_eq!(info.size, 3);
        assert!(info.value.starts_with("ok"));
    }
}
