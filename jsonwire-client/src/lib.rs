//! # jsonwire-client
//!
//! Client library for jsonwire.
//!
//! This crate provides:
//! - Host resolution and connection with a timeout
//! - Request/reply helpers over the connection engine
//! - Interactive execution of registered operations

pub mod client;
pub mod error;

pub use client::{Client, ClientConfig};
pub use error::ClientError;
