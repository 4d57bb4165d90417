//! jsonwire - JSON messaging server
//!
//! Serves length-prefixed JSON requests over TCP, dispatching each to the
//! operation named by its `operation` code.

use clap::Parser;
use jsonwire_server::{Config, Server};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonwire")]
#[command(about = "Length-prefixed JSON messaging server", long_about = None)]
#[command(version)]
struct Cli {
    /// Port to listen on
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if JSONWIRE_CONFIG is set, then env overrides)
    let config_path = std::env::var("JSONWIRE_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(ref path) = config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    let server_config = config.server_config(cli.port);
    tracing::info!("Starting jsonwire server");
    tracing::info!("  Bind address: {}", server_config.bind_addr);
    tracing::info!("  Max connections: {}", server_config.max_connections);
    tracing::info!(
        "  Poll interval: {:?}",
        server_config.engine.poll_interval
    );

    let server = Arc::new(Server::new(server_config));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_port_argument() {
        let cli = Cli::try_parse_from(["jsonwire", "4000"]).unwrap();
        assert_eq!(cli.port, 4000);

        assert!(Cli::try_parse_from(["jsonwire"]).is_err());
        assert!(Cli::try_parse_from(["jsonwire", "70000"]).is_err());
        assert!(Cli::try_parse_from(["jsonwire", "4000", "extra"]).is_err());
    }
}
