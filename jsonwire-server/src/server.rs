//! TCP server implementation.

use crate::error::ServerError;
use crate::handler::ClientHandler;
use jsonwire_core::{Connection, EngineConfig, OperationRegistry};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Settings for each connection's engine.
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            max_connections: 1000,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server: accepts connections and serves each with a [`ClientHandler`].
pub struct Server {
    config: ServerConfig,
    registry: Arc<OperationRegistry>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a server with the built-in operations.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, OperationRegistry::builtin())
    }

    /// Creates a server dispatching to `registry`.
    pub fn with_registry(config: ServerConfig, registry: OperationRegistry) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            registry: Arc::new(registry),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and runs until [`Server::shutdown`].
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Runs the accept loop on an already-bound listener.
    ///
    /// On shutdown every open connection is closed gracefully (each client
    /// receives the terminal frame) before this returns.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        tracing::info!("Server listening on {}", listener.local_addr()?);

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let connection = Arc::new(Connection::with_config(
                                tcp_stream,
                                self.config.engine.clone(),
                            ));
                            let handler = ClientHandler::new(connection.clone(), self.registry.clone())
                                .with_stats(self.stats.clone());
                            let stats = self.stats.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            connections.spawn(async move {
                                tracing::info!("Client connected: {}", addr);

                                tokio::select! {
                                    _ = handler.run() => {}
                                    _ = conn_shutdown.recv() => {
                                        tracing::debug!("[{}] Shutdown signal received", addr);
                                        connection.close().await;
                                    }
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = result {
                        tracing::error!("Connection task failed: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        drop(listener);
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                tracing::error!("Connection task failed: {}", e);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Server closed");
        Ok(())
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
