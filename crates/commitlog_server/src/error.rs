//! Error types for the log service.

use commitlog_core::CoreError;
use std::fmt;
use thiserror::Error;

/// Result type for service operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Status code reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// The request was malformed.
    InvalidArgument,
    /// The requested offset has no record.
    OutOfRange,
    /// The caller presented no usable identity.
    Unauthenticated,
    /// The caller's identity may not perform the action.
    PermissionDenied,
    /// Unclassified failure.
    Unknown,
    /// The call was cancelled.
    Cancelled,
    /// The stream to or from the caller is gone.
    Unavailable,
    /// The server failed.
    Internal,
}

impl Code {
    /// Returns the conventional name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unknown => "UNKNOWN",
            Self::Cancelled => "CANCELLED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while serving a call.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Missing or malformed request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No record exists at the requested offset.
    #[error("offset out of range: {offset}")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u64,
    },

    /// The caller could not be identified.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller may not perform the action.
    #[error("{subject} not permitted to {action} to {object}")]
    PermissionDenied {
        /// Authenticated identity of the caller.
        subject: String,
        /// Resource the caller tried to act on.
        object: String,
        /// Attempted action.
        action: String,
    },

    /// Unclassified failure.
    #[error("unknown: {0}")]
    Unknown(String),

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,

    /// A request or response stream closed underneath the call.
    #[error("transport error: {0}")]
    Transport(String),

    /// The log failed.
    #[error("log error: {0}")]
    Log(#[source] CoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns the status code for this error.
    #[must_use]
    pub fn code(&self) -> Code {
        match self {
            Self::InvalidArgument(_) => Code::InvalidArgument,
            Self::OffsetOutOfRange { .. } => Code::OutOfRange,
            Self::Unauthenticated(_) => Code::Unauthenticated,
            Self::PermissionDenied { .. } => Code::PermissionDenied,
            Self::Unknown(_) => Code::Unknown,
            Self::Cancelled => Code::Cancelled,
            Self::Transport(_) => Code::Unavailable,
            Self::Log(_) | Self::Internal(_) => Code::Internal,
        }
    }

    /// Returns true if the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidArgument(_)
                | ServerError::OffsetOutOfRange { .. }
                | ServerError::Unauthenticated(_)
                | ServerError::PermissionDenied { .. }
        )
    }

    /// Returns true if the server is at fault.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ServerError::Unknown(_)
                | ServerError::Transport(_)
                | ServerError::Log(_)
                | ServerError::Internal(_)
        )
    }
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OffsetOutOfRange { offset } => Self::OffsetOutOfRange { offset },
            other => Self::Log(other),
        }
    }
}
