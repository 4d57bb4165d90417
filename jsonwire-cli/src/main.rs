//! jsonwire-cli - Interactive client for jsonwire servers
//!
//! Connects to a server, then repeatedly lists the available operations and
//! runs the one the user picks.

mod repl;

use clap::Parser;
use colored::Colorize;
use jsonwire_client::{Client, ClientConfig};
use std::net::ToSocketAddrs;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonwire-cli")]
#[command(about = "Interactive client for jsonwire servers")]
#[command(version)]
struct Cli {
    /// Server port (0-65535)
    port: u16,

    /// Server host name or address
    #[arg(value_parser = parse_host)]
    host: String,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 10, env = "JSONWIRE_CONNECT_TIMEOUT")]
    connect_timeout: u64,
}

/// Accepts a host only if it resolves to at least one address.
fn parse_host(host: &str) -> Result<String, String> {
    if host.trim().is_empty() {
        return Err("host address is empty".to_string());
    }
    match (host, 0).to_socket_addrs() {
        Ok(addrs) if addrs.clone().next().is_some() => Ok(host.to_string()),
        Ok(_) => Err(format!("host address '{}' is invalid", host)),
        Err(e) => Err(format!("host address '{}' is invalid: {}", host, e)),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = ClientConfig::new(&cli.host, cli.port)
        .with_connect_timeout(Duration::from_secs(cli.connect_timeout));

    let client = match Client::connect(config).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!(
                "{}: could not connect to {}:{}: {}",
                "Error".red(),
                cli.host,
                cli.port,
                e
            );
            std::process::exit(1);
        }
    };

    repl::run(client).await
}
