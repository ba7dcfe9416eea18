//! Log configuration.

use crate::error::{CoreError, CoreResult};
use commitlog_storage::ENTRY_WIDTH;

/// Size caps and starting offset for segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentConfig {
    /// Store size at which a segment is sealed.
    pub max_store_bytes: u64,

    /// Index size at which a segment is sealed.
    ///
    /// Also the hard cap the index file may grow to.
    pub max_index_bytes: u64,

    /// Base offset of the first segment of a new log.
    pub initial_offset: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_store_bytes: 1024 * 1024, // 1 MB
            max_index_bytes: 1024 * 1024, // 1 MB
            initial_offset: 0,
        }
    }
}

/// Configuration for opening a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Segment settings.
    pub segment: SegmentConfig,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store size cap per segment.
    #[must_use]
    pub const fn max_store_bytes(mut self, size: u64) -> Self {
        self.segment.max_store_bytes = size;
        self
    }

    /// Sets the index size cap per segment.
    #[must_use]
    pub const fn max_index_bytes(mut self, size: u64) -> Self {
        self.segment.max_index_bytes = size;
        self
    }

    /// Sets the base offset of a brand new log.
    #[must_use]
    pub const fn initial_offset(mut self, offset: u64) -> Self {
        self.segment.initial_offset = offset;
        self
    }

    /// Checks that a segment can hold at least one record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the store cap is zero, the
    /// index cap is smaller than one index entry, or the initial offset is
    /// `u64::MAX`.
    pub fn validate(&self) -> CoreResult<()> {
        if self.segment.max_store_bytes == 0 {
            return Err(CoreError::invalid_config("max_store_bytes must be > 0"));
        }
        if self.segment.max_index_bytes < ENTRY_WIDTH {
            return Err(CoreError::invalid_config(format!(
                "max_index_bytes must be at least {ENTRY_WIDTH}"
            )));
        }
        if self.segment.initial_offset == u64::MAX {
            return Err(CoreError::invalid_config(
                "initial_offset leaves no room for a record",
            ));
        }
        Ok(())
    }
}
