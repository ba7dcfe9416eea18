//! Error types for the commit log.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in commit log operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage file error.
    #[error("storage error: {0}")]
    Storage(#[from] commitlog_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record encoding or decoding failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// No record exists at the requested offset.
    ///
    /// Raised both for offsets that were never written yet and for offsets
    /// below the earliest retained segment.
    #[error("offset out of range: {offset}")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u64,
    },

    /// Configuration is unusable.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// Another process holds the log directory.
    #[error("log directory locked: another process has exclusive access")]
    DirectoryLocked,

    /// The log has been closed.
    #[error("log is closed")]
    Closed,
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an offset out of range error.
    pub fn out_of_range(offset: u64) -> Self {
        Self::OffsetOutOfRange { offset }
    }

    /// Returns true if the requested offset has no record.
    #[must_use]
    pub fn is_offset_out_of_range(&self) -> bool {
        matches!(self, Self::OffsetOutOfRange { .. })
    }
}
