use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use ledger_gateway::admission::maintenance::{StaticSettingsProvider, StaticTokenValidator};
use ledger_gateway::config::loader::{load_config, load_from_env};
use ledger_gateway::http::server::default_inner_router;
use ledger_gateway::observability::{logging, metrics};
use ledger_gateway::HttpServer;

/// Admission gateway for the accounting backend.
#[derive(Debug, Parser)]
#[command(name = "ledger-gateway", version)]
struct Args {
    /// Path to a TOML configuration file. Defaults plus environment
    /// overrides apply when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path),
        None => load_from_env(),
    }
    .unwrap_or_else(|e| {
        eprintln!("configuration error: {}", e);
        std::process::exit(1);
    });

    logging::init(&config.observability.log_level);

    tracing::info!(
        environment = ?config.environment,
        bind_address = %config.listener.bind_address,
        "ledger-gateway starting"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // In-process collaborators; a deployment wired into a real settings
    // service swaps these at the HttpServer boundary.
    let settings = StaticSettingsProvider::from_config(&config.maintenance);
    let validator = StaticTokenValidator::new(config.admin.token.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, default_inner_router(), settings, validator);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
