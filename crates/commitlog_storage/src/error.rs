//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a store file.
    #[error("read beyond end of store: position {position}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read position.
        position: u64,
        /// The requested read length.
        len: u64,
        /// The current store size.
        size: u64,
    },

    /// An index lookup named an entry that does not exist.
    ///
    /// This is a control signal for callers, not an I/O failure.
    #[error("index entry {entry} out of range ({entries} entries)")]
    OutOfRange {
        /// The requested entry (`-1` means "last").
        entry: i64,
        /// Number of entries in the index.
        entries: u64,
    },

    /// The index reached its configured byte cap.
    #[error("index full: size {size}, max {max}")]
    IndexFull {
        /// Current index size in bytes.
        size: u64,
        /// Configured maximum size in bytes.
        max: u64,
    },

    /// A file is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The file has been closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Returns true if this error is an index out-of-range signal.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, StorageError::OutOfRange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_is_a_signal() {
        let err = StorageError::OutOfRange {
            entry: 3,
            entries: 2,
        };
        assert!(err.is_out_of_range());
        assert!(!StorageError::Closed.is_out_of_range());
    }

    #[test]
    fn error_display() {
        let err = StorageError::IndexFull { size: 24, max: 24 };
        let msg = err.to_string();
        assert!(msg.contains("24"));
    }
}
