//! The JSON document exchanged between peers.

use crate::error::{ErrorCode, ProtocolError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Operation code of the shutdown request and of the terminal frame.
pub const SHUTDOWN_OPERATION: i64 = 0;

/// A protocol message: an order-preserving JSON object.
///
/// Messages have no schema beyond the protocol-level fields (`operation`,
/// `error`, `message`); everything else is operation specific.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Creates an empty message (`{}`).
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Creates a request for the given operation code.
    pub fn request(operation: i64) -> Self {
        Self::new().with("operation", operation)
    }

    /// The terminal message: `{"operation":0}`.
    pub fn shutdown() -> Self {
        Self::request(SHUTDOWN_OPERATION)
    }

    /// A standard error envelope: `{"error":<code>,"message":"<text>"}`.
    pub fn error(code: ErrorCode) -> Self {
        Self::new()
            .with("error", code.code())
            .with("message", code.message())
    }

    /// Returns the message with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads the integer `operation` field.
    ///
    /// A missing field maps to `MissingRequiredArgument`, anything other than
    /// an integer maps to `IllegalArgumentType`.
    pub fn operation(&self) -> Result<i64, ErrorCode> {
        match self.0.get("operation") {
            None => Err(ErrorCode::MissingRequiredArgument),
            Some(value) => value.as_i64().ok_or(ErrorCode::IllegalArgumentType),
        }
    }

    /// Returns whether this is the terminal `{"operation":0}` message.
    pub fn is_shutdown(&self) -> bool {
        !self.is_error() && self.operation() == Ok(SHUTDOWN_OPERATION)
    }

    /// Returns whether this message is an error envelope.
    pub fn is_error(&self) -> bool {
        self.0.contains_key("error")
    }

    /// The error code of an error envelope, if it is one we know.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.0
            .get("error")
            .and_then(Value::as_i64)
            .and_then(ErrorCode::from_code)
    }

    /// The `message` text of an error envelope.
    pub fn error_message(&self) -> Option<&str> {
        self.0.get("message").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Parses a UTF-8 JSON payload into a message.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
        let value: Value = serde_json::from_str(text)?;
        Self::try_from(value)
    }

    /// Serializes the message as compact UTF-8 JSON.
    pub fn to_vec(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(&self.0)?)
    }
}

impl From<Map<String, Value>> for Message {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Message {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ProtocolError::NotAnObject),
        }
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        Value::Object(message.0)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("<unprintable message>"),
        }
    }
}
