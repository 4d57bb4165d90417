//! Per-connection request dispatch.

use crate::server::ServerStats;
use jsonwire_core::{Connection, OperationRegistry};
use jsonwire_protocol::{ErrorCode, Message};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// What the dispatch loop does after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Serves requests arriving on one connection.
pub struct ClientHandler {
    connection: Arc<Connection>,
    registry: Arc<OperationRegistry>,
    stats: Option<Arc<ServerStats>>,
    label: String,
}

impl ClientHandler {
    pub fn new(connection: Arc<Connection>, registry: Arc<OperationRegistry>) -> Self {
        let label = connection
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "local".to_string());
        Self {
            connection,
            registry,
            stats: None,
            label,
        }
    }

    /// Counts requests and errors into `stats`.
    pub fn with_stats(mut self, stats: Arc<ServerStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Starts the engine and dispatches requests until the connection stops
    /// or a request ends the session. The connection is always closed on
    /// return.
    pub async fn run(&self) {
        self.connection.start();
        tracing::info!("[{}] Server connected to client", self.label);

        loop {
            let request = self.connection.receive().await;
            if self.dispatch(request).await == Flow::Stop {
                break;
            }
            if !self.connection.is_running() && !self.connection.has_received() {
                break;
            }
        }

        self.connection.close().await;
    }

    /// Routes one request to its operation.
    pub async fn dispatch(&self, request: Message) -> Flow {
        tracing::debug!("[{}] Request: {}", self.label, request);
        if let Some(ref stats) = self.stats {
            stats.requests_total.fetch_add(1, Ordering::Relaxed);
        }

        let code = match request.operation() {
            Ok(code) => code,
            Err(error) => {
                tracing::warn!("[{}] Rejecting request {}: {}", self.label, request, error);
                self.reply_error(error);
                return Flow::Stop;
            }
        };

        let Some(operation) = self.registry.get(code) else {
            tracing::warn!("[{}] Unsupported operation: {}", self.label, code);
            self.reply_error(ErrorCode::UnsupportedOperation);
            return Flow::Continue;
        };

        match operation.handle_server(request, &self.connection).await {
            Ok(()) => Flow::Continue,
            Err(e) => {
                tracing::error!(
                    "[{}] Client handler encountered an internal error: {}",
                    self.label,
                    e
                );
                self.reply_error(ErrorCode::InternalError);
                Flow::Stop
            }
        }
    }

    fn reply_error(&self, code: ErrorCode) {
        if let Some(ref stats) = self.stats {
            stats.errors_total.fetch_add(1, Ordering::Relaxed);
        }
        self.connection.send(Message::error(code));
    }
}
