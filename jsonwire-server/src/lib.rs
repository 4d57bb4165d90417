//! # jsonwire-server
//!
//! TCP server for jsonwire.
//!
//! This crate provides:
//! - The TCP accept loop with graceful shutdown
//! - Per-connection request dispatch through the operation registry
//! - Layered YAML/environment configuration

pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use config::{Config, ConfigError, EngineSettings, NetworkConfig};
pub use error::ServerError;
pub use handler::{ClientHandler, Flow};
pub use server::{Server, ServerConfig, ServerStats};
