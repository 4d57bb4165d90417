//! Client error types.

use jsonwire_protocol::ErrorCode;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Core(#[from] jsonwire_core::CoreError),

    #[error("could not resolve host '{0}'")]
    Resolve(String),

    #[error("connection timeout")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("unsupported operation: {0}")]
    UnknownOperation(i64),

    #[error("server error: {message} ({code})")]
    ServerError { code: i64, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    /// The standard error code of a server error, if it is one we know.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::ServerError { code, .. } => ErrorCode::from_code(*code),
            _ => None,
        }
    }
}
