//! The operation trait shared by server and client.

use crate::connection::Connection;
use crate::error::CoreError;
use async_trait::async_trait;
use jsonwire_protocol::Message;

/// A request type identified by an integer code.
///
/// The server side answers a decoded request; the client side builds a
/// request interactively, sends it and presents the reply.
#[async_trait]
pub trait Operation: Send + Sync {
    /// One-line human-readable description, shown in operation listings.
    fn description(&self) -> &'static str;

    /// Handles a request received by the server.
    async fn handle_server(
        &self,
        request: Message,
        connection: &Connection,
    ) -> Result<(), CoreError>;

    /// Drives the client side of the operation.
    async fn handle_client(
        &self,
        connection: &Connection,
        prompt: &mut dyn Prompt,
    ) -> Result<(), CoreError>;
}

/// Line-oriented user interaction for client-side operations.
pub trait Prompt: Send {
    /// Shows `prompt` and reads one line. `None` means input has ended.
    fn read_line(&mut self, prompt: &str) -> Option<String>;

    /// Shows one line of output.
    fn display(&mut self, line: &str);
}

/// Scripted prompt, for driving client-side operations without a terminal.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    inputs: std::collections::VecDeque<String>,
    /// Every prompt shown, in order.
    pub prompts: Vec<String>,
    /// Every line displayed, in order.
    pub output: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            output: Vec::new(),
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        self.prompts.push(prompt.to_string());
        self.inputs.pop_front()
    }

    fn display(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}
