//! Request and response messages.

use commitlog_core::Record;

/// Appends one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProduceRequest {
    /// The record to append. Its offset is ignored.
    pub record: Option<Record>,
}

impl ProduceRequest {
    /// Creates a request carrying a record with `value`.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            record: Some(Record::new(value)),
        }
    }
}

/// Result of a produce call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProduceResponse {
    /// Offset assigned to the record.
    pub offset: u64,
}

/// Reads the record at an offset, or tails the log from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeRequest {
    /// Offset to read.
    pub offset: u64,
}

impl ConsumeRequest {
    /// Creates a request for `offset`.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }
}

/// Result of a consume call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeResponse {
    /// The record read, carrying its offset.
    pub record: Record,
}
