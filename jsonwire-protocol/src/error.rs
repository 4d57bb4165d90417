//! Protocol error types and error codes.

use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur during framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid frame length: {0} bytes (min {min})", min = crate::MIN_PAYLOAD_SIZE)]
    InvalidLength(u32),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("connection closed")]
    ConnectionClosed,
}

impl ProtocolError {
    /// Returns whether the stream that produced this error is unusable.
    ///
    /// Non-fatal errors only invalidate the current frame; the next frame can
    /// still be read from the same stream.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Io(_) | ProtocolError::ConnectionClosed)
    }

    /// Error envelope reported to the peer for this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProtocolError::Json(_) | ProtocolError::InvalidUtf8 | ProtocolError::NotAnObject => {
                ErrorCode::MalformedJson
            }
            _ => ErrorCode::InternalError,
        }
    }
}

/// Stable error codes carried in the `error` field of an error envelope.
///
/// These codes are part of the protocol contract and must remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InternalError,
    MalformedJson,
    UnsupportedOperation,
    IllegalArgumentType,
    MissingRequiredArgument,
}

impl ErrorCode {
    /// Numeric wire value.
    pub fn code(&self) -> i64 {
        match self {
            ErrorCode::InternalError => -1,
            ErrorCode::MalformedJson => 0,
            ErrorCode::UnsupportedOperation => 1,
            ErrorCode::IllegalArgumentType => 2,
            ErrorCode::MissingRequiredArgument => 3,
        }
    }

    /// Looks up an error code by its wire value.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(ErrorCode::InternalError),
            0 => Some(ErrorCode::MalformedJson),
            1 => Some(ErrorCode::UnsupportedOperation),
            2 => Some(ErrorCode::IllegalArgumentType),
            3 => Some(ErrorCode::MissingRequiredArgument),
            _ => None,
        }
    }

    /// Human-readable text sent in the `message` field.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InternalError => "Internal Server Error",
            ErrorCode::MalformedJson => "Malformed Json",
            ErrorCode::UnsupportedOperation => "Unsupported Operation",
            ErrorCode::IllegalArgumentType => "Illegal Argument Type",
            ErrorCode::MissingRequiredArgument => "Missing Required Argument",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}
