//! # jsonwire-core
//!
//! Connection engine and operations for jsonwire.
//!
//! This crate provides:
//! - The per-connection I/O engine with outbound/inbound queues
//! - The graceful shutdown handshake
//! - The `Operation` trait and the operation registry
//! - The built-in Shutdown and Hypotenuse operations

pub mod connection;
pub mod error;
pub mod operation;
pub mod operations;
pub mod registry;

pub use connection::{Connection, ConnectionState, EngineConfig, DEFAULT_POLL_INTERVAL};
pub use error::CoreError;
pub use operation::{Operation, Prompt, ScriptedPrompt};
pub use operations::{HypotenuseOperation, ShutdownOperation, HYPOTENUSE_OPERATION};
pub use registry::OperationRegistry;
