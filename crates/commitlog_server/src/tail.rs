//! State machine behind tailing consumers.
//!
//! ```text
//!            read ok                      sent, offset + 1
//!   Polling ─────────▶ Delivering(record) ─────────────────▶ Polling
//!     │  ▲
//!     └──┘ out of range: back off, read again
//!
//!   any state ── cancelled / fatal error ──▶ Terminated
//! ```
//!
//! Reading past the end of the log is the normal state of a caught-up
//! consumer, never a reason to stop.

use crate::error::{ServerError, ServerResult};
use commitlog_core::Record;
use std::time::Duration;

/// Where a tailing consumer stands.
#[derive(Debug)]
pub enum TailState {
    /// Waiting for the next offset to be written.
    Polling,
    /// Holding a record to send.
    Delivering(Record),
    /// Finished.
    Terminated(Termination),
}

/// Why a tailing consumer stopped.
#[derive(Debug)]
pub enum Termination {
    /// The caller cancelled.
    Cancelled,
    /// Reading or sending failed.
    Failed(ServerError),
}

impl TailState {
    /// Transition out of `Polling` given the outcome of a read.
    pub fn after_read(result: ServerResult<Record>) -> Self {
        match result {
            Ok(record) => Self::Delivering(record),
            Err(ServerError::OffsetOutOfRange { .. }) => Self::Polling,
            Err(e) => Self::Terminated(Termination::Failed(e)),
        }
    }
}

impl Termination {
    /// Converts the end of the stream into the call's result.
    pub fn into_result(self) -> ServerResult<()> {
        match self {
            Self::Cancelled => Err(ServerError::Cancelled),
            Self::Failed(e) => Err(e),
        }
    }
}

/// Doubling wait between reads of a caught-up consumer.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a backoff starting at `initial` and capped at `max`.
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Returns the next wait and doubles the one after it.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Starts over from the initial wait.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
