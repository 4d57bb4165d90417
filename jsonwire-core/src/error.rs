//! Core error types.

use thiserror::Error;

/// Errors raised by operation handlers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The user's input ended before the operation had what it needed.
    #[error("input closed")]
    InputClosed,
}
