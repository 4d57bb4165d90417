//! # jsonwire-protocol
//!
//! Wire protocol implementation for jsonwire.
//!
//! This crate provides:
//! - Length-prefixed framing (4-byte big-endian length + UTF-8 JSON object)
//! - Async frame reading/writing over any tokio byte stream
//! - The `Message` document type and the standard error envelopes
//! - Error codes and protocol constants

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{read_message, write_message, Decoder, Encoder};
pub use error::{ErrorCode, ProtocolError};
pub use frame::{Frame, LENGTH_PREFIX_SIZE};
pub use message::{Message, SHUTDOWN_OPERATION};

/// Smallest valid payload length: `{}` or `[]`.
pub const MIN_PAYLOAD_SIZE: u32 = 2;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
