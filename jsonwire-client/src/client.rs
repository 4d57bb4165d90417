//! High-level client API.

use crate::error::ClientError;
use jsonwire_core::{Connection, EngineConfig, HypotenuseOperation, OperationRegistry, Prompt};
use jsonwire_protocol::Message;
use serde_json::Number;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Timeout for each connection attempt.
    pub connect_timeout: Duration,
    /// Settings for the connection engine.
    pub engine: EngineConfig,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(10),
            engine: EngineConfig::default(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// A started connection to a jsonwire server plus the operations it knows.
pub struct Client {
    connection: Arc<Connection>,
    registry: Arc<OperationRegistry>,
}

impl Client {
    /// Resolves the host, connects and starts the connection engine.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        Self::connect_with_registry(config, OperationRegistry::builtin()).await
    }

    /// Like [`Client::connect`], with a custom set of operations.
    pub async fn connect_with_registry(
        config: ClientConfig,
        registry: OperationRegistry,
    ) -> Result<Self, ClientError> {
        let stream = Self::open_stream(&config).await?;
        let connection = Connection::with_config(stream, config.engine.clone());
        connection.start();

        Ok(Self {
            connection: Arc::new(connection),
            registry: Arc::new(registry),
        })
    }

    async fn open_stream(config: &ClientConfig) -> Result<TcpStream, ClientError> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((config.host.as_str(), config.port))
            .await
            .map_err(|e| {
                tracing::debug!("Failed to resolve {}: {}", config.host, e);
                ClientError::Resolve(config.host.clone())
            })?
            .collect();
        if addrs.is_empty() {
            return Err(ClientError::Resolve(config.host.clone()));
        }

        let mut last_error = ClientError::Resolve(config.host.clone());
        for addr in addrs {
            tracing::debug!("Connecting to {}...", addr);
            match tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    tracing::info!("Connected to {}", addr);
                    return Ok(stream);
                }
                Ok(Err(e)) => {
                    tracing::debug!("Connection to {} failed: {}", addr, e);
                    last_error = ClientError::Io(e);
                }
                Err(_) => {
                    tracing::debug!("Connection to {} timed out", addr);
                    last_error = ClientError::Timeout;
                }
            }
        }
        Err(last_error)
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Returns whether the connection is still running.
    pub fn is_running(&self) -> bool {
        self.connection.is_running()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.connection.peer_addr()
    }

    /// Runs the client side of operation `code`, reading input from `prompt`.
    pub async fn run_operation(&self, code: i64, prompt: &mut dyn Prompt) -> Result<(), ClientError> {
        let operation = self
            .registry
            .get(code)
            .ok_or(ClientError::UnknownOperation(code))?;
        operation.handle_client(&self.connection, prompt).await?;
        Ok(())
    }

    /// Sends `message` and waits for the next reply.
    ///
    /// Error envelopes become [`ClientError::ServerError`]; the terminal
    /// message becomes [`ClientError::ConnectionClosed`].
    pub async fn request(&self, message: Message) -> Result<Message, ClientError> {
        if !self.connection.is_running() {
            return Err(ClientError::ConnectionClosed);
        }

        self.connection.send(message);
        let reply = self.connection.receive().await;

        if reply.is_error() {
            let code = reply.get("error").and_then(|c| c.as_i64()).unwrap_or(-1);
            let message = reply.error_message().unwrap_or_default().to_string();
            return Err(ClientError::ServerError { code, message });
        }
        if reply.is_shutdown() {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(reply)
    }

    /// Asks the server for the hypotenuse of a right triangle.
    pub async fn hypotenuse(&self, a: Number, b: Number) -> Result<f64, ClientError> {
        let reply = self.request(HypotenuseOperation::request(a, b)).await?;
        reply
            .get("result")
            .and_then(|r| r.as_f64())
            .ok_or_else(|| ClientError::MalformedResponse(reply.to_string()))
    }

    /// Closes the connection gracefully.
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwire_core::ScriptedPrompt;
    use jsonwire_protocol::{read_message, write_message, ErrorCode};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    fn fast(port: u16) -> ClientConfig {
        ClientConfig::new("127.0.0.1", port)
            .with_engine(EngineConfig::new().with_poll_interval(Duration::from_millis(10)))
    }

    /// Accepts one connection and answers each request with the next reply.
    async fn scripted_server(replies: Vec<Message>) -> (u16, tokio::task::JoinHandle<Vec<Message>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut requests = Vec::new();
            for reply in replies {
                requests.push(read_message(&mut stream).await.unwrap());
                write_message(&mut stream, &reply).await.unwrap();
            }
            // Whatever comes next (normally the terminal frame)
            if let Ok(last) = read_message(&mut stream).await {
                requests.push(last);
            }
            requests
        });
        (port, task)
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("localhost", 4000).with_connect_timeout(Duration::from_secs(1));
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 4000);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = Client::connect(fast(port)).await;
        assert!(matches!(result, Err(ClientError::Io(_))));
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let config = ClientConfig::new("host.invalid", 80);
        let result = Client::connect(config).await;
        assert!(matches!(result, Err(ClientError::Resolve(_))));
    }

    #[tokio::test]
    async fn test_hypotenuse_request() {
        let reply = Message::request(1).with("a", 3).with("b", 4).with("result", 5.0);
        let (port, server) = scripted_server(vec![reply]).await;

        let client = Client::connect(fast(port)).await.unwrap();
        assert!(client.is_running());
        let result = assert_ok!(client.hypotenuse(Number::from(3), Number::from(4)).await);
        assert_eq!(result, 5.0);

        client.close().await;
        assert!(!client.is_running());

        let requests = server.await.unwrap();
        assert_eq!(requests[0].operation(), Ok(1));
        assert!(requests[1].is_shutdown());
    }

    #[tokio::test]
    async fn test_server_error_reply() {
        let (port, server) =
            scripted_server(vec![Message::error(ErrorCode::UnsupportedOperation)]).await;

        let client = Client::connect(fast(port)).await.unwrap();
        let err = client.request(Message::request(7)).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::UnsupportedOperation));

        client.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_operation() {
        let reply = Message::request(1).with("a", 6).with("b", 8).with("result", 10.0);
        let (port, server) = scripted_server(vec![reply]).await;

        let client = Client::connect(fast(port)).await.unwrap();

        let mut prompt = ScriptedPrompt::new(["6", "8"]);
        assert_ok!(client.run_operation(1, &mut prompt).await);
        assert_eq!(prompt.output, vec!["The hypotenuse is: 10"]);

        let mut prompt = ScriptedPrompt::default();
        assert!(matches!(
            client.run_operation(5, &mut prompt).await,
            Err(ClientError::UnknownOperation(5))
        ));

        // Operation 0 closes the connection
        client.run_operation(0, &mut prompt).await.unwrap();
        assert!(!client.is_running());

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].is_shutdown());
    }

    #[tokio::test]
    async fn test_request_after_close() {
        let (port, server) = scripted_server(vec![]).await;
        let client = Client::connect(fast(port)).await.unwrap();
        client.close().await;

        assert!(matches!(
            client.request(Message::request(1)).await,
            Err(ClientError::ConnectionClosed)
        ));
        server.await.unwrap();
    }
}
