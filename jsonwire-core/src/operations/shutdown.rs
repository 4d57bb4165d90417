//! Operation 0: orderly connection shutdown.

use crate::connection::Connection;
use crate::error::CoreError;
use crate::operation::{Operation, Prompt};
use async_trait::async_trait;
use jsonwire_protocol::Message;

/// Closes the connection on either side.
///
/// Closing writes the terminal `{"operation":0}` frame, which the peer
/// dispatches to its own shutdown handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutdownOperation;

#[async_trait]
impl Operation for ShutdownOperation {
    fn description(&self) -> &'static str {
        "This operation shuts down the connection between the client and the server."
    }

    async fn handle_server(
        &self,
        _request: Message,
        connection: &Connection,
    ) -> Result<(), CoreError> {
        connection.close().await;
        Ok(())
    }

    async fn handle_client(
        &self,
        connection: &Connection,
        _prompt: &mut dyn Prompt,
    ) -> Result<(), CoreError> {
        connection.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::EngineConfig;
    use crate::operation::ScriptedPrompt;
    use jsonwire_protocol::{read_message, ProtocolError};
    use std::time::Duration;

    fn pair() -> (Connection, tokio::io::DuplexStream) {
        let (local, remote) = tokio::io::duplex(4096);
        let config = EngineConfig::new().with_poll_interval(Duration::from_millis(10));
        (Connection::from_stream(local, config), remote)
    }

    #[tokio::test]
    async fn test_server_side_closes() {
        let (conn, mut peer) = pair();
        conn.start();

        ShutdownOperation
            .handle_server(Message::shutdown(), &conn)
            .await
            .unwrap();

        assert!(!conn.is_running());
        assert!(read_message(&mut peer).await.unwrap().is_shutdown());
        assert!(matches!(
            read_message(&mut peer).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_client_side_closes() {
        let (conn, mut peer) = pair();
        conn.start();

        let mut prompt = ScriptedPrompt::default();
        ShutdownOperation
            .handle_client(&conn, &mut prompt)
            .await
            .unwrap();

        assert!(!conn.is_running());
        assert!(prompt.prompts.is_empty());
        assert!(read_message(&mut peer).await.unwrap().is_shutdown());
    }
}
