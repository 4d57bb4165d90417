//! Operation 1: hypotenuse of a right triangle.
//!
//! Request:  `{"operation":1,"a":<number>,"b":<number>}`
//! Response: `{"operation":1,"a":<a>,"b":<b>,"result":<number>}`

use crate::connection::Connection;
use crate::error::CoreError;
use crate::operation::{Operation, Prompt};
use async_trait::async_trait;
use jsonwire_protocol::{ErrorCode, Message};
use serde_json::Number;

/// Operation code of the hypotenuse request.
pub const HYPOTENUSE_OPERATION: i64 = 1;

const FIRST_SIDE_PROMPT: &str = "Please enter the side of one of the triangles: ";
const SECOND_SIDE_PROMPT: &str = "Please enter the side of the other triangle: ";

#[derive(Debug, Clone, Copy, Default)]
pub struct HypotenuseOperation;

impl HypotenuseOperation {
    /// Builds a request for sides `a` and `b`.
    pub fn request(a: Number, b: Number) -> Message {
        Message::request(HYPOTENUSE_OPERATION)
            .with("a", a)
            .with("b", b)
    }

    /// Computes the response to a request, or the error to answer with.
    ///
    /// The sides are echoed back unchanged. A result too large for a JSON
    /// number is an internal error: both sides were valid.
    pub fn respond(request: &Message) -> Result<Message, ErrorCode> {
        let (Some(a), Some(b)) = (request.get("a"), request.get("b")) else {
            return Err(ErrorCode::MissingRequiredArgument);
        };
        let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
            return Err(ErrorCode::IllegalArgumentType);
        };
        let result = Number::from_f64(x.hypot(y)).ok_or(ErrorCode::InternalError)?;

        Ok(Message::request(HYPOTENUSE_OPERATION)
            .with("a", a.clone())
            .with("b", b.clone())
            .with("result", result))
    }
}

/// Parses user input as an integer if possible, otherwise as a finite float.
pub fn parse_number(input: &str) -> Option<Number> {
    let input = input.trim();
    if let Ok(n) = input.parse::<i64>() {
        return Some(Number::from(n));
    }
    input.parse::<f64>().ok().and_then(Number::from_f64)
}

fn read_side(prompt: &mut dyn Prompt, text: &str) -> Result<Number, CoreError> {
    loop {
        let line = prompt.read_line(text).ok_or(CoreError::InputClosed)?;
        match parse_number(&line) {
            Some(n) => return Ok(n),
            None => prompt.display("Please enter a valid number: "),
        }
    }
}

#[async_trait]
impl Operation for HypotenuseOperation {
    fn description(&self) -> &'static str {
        "This operation calculates the hypotenuse of a right triangle."
    }

    async fn handle_server(
        &self,
        request: Message,
        connection: &Connection,
    ) -> Result<(), CoreError> {
        match Self::respond(&request) {
            Ok(response) => connection.send(response),
            Err(code) => {
                tracing::debug!("Rejecting hypotenuse request {}: {}", request, code);
                connection.send(Message::error(code));
            }
        }
        Ok(())
    }

    async fn handle_client(
        &self,
        connection: &Connection,
        prompt: &mut dyn Prompt,
    ) -> Result<(), CoreError> {
        let a = read_side(prompt, FIRST_SIDE_PROMPT)?;
        let b = read_side(prompt, SECOND_SIDE_PROMPT)?;

        connection.send(Self::request(a, b));
        let response = connection.receive().await;

        if response.is_shutdown() {
            prompt.display("The server closed the connection.");
            connection.close().await;
            return Ok(());
        }
        if response.is_error() {
            match response.error_message() {
                Some(message) => prompt.display(&format!("Error: {}", message)),
                None => prompt.display("Error: Malformed response received from server."),
            }
            return Ok(());
        }
        match response.get("result").and_then(|r| r.as_f64()) {
            Some(result) => prompt.display(&format!("The hypotenuse is: {}", result)),
            None => prompt.display("Error: Malformed response received from server."),
        }
        Ok(())
    }
}
