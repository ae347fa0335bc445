//! Canopy - subtree lookup server
//!
//! Binary entry point: loads configuration, builds the tree service,
//! and serves the HTTP API until interrupted.

use canopy::cli::Cli;
use canopy::config::ConfigManager;
use canopy::error::{CanopyError, CanopyResult};
use canopy::server;
use canopy::service::TreeService;
use clap::Parser;
use console::style;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CanopyResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = info, 1 = debug, 2+ = trace
    let filter = match cli.verbose {
        0 => EnvFilter::new("canopy=info"),
        1 => EnvFilter::new("canopy=debug"),
        _ => EnvFilter::new("canopy=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    let listen = cli
        .listen
        .unwrap_or_else(|| config.server.listen.clone());
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e: std::net::AddrParseError| CanopyError::ListenAddrInvalid {
            addr: listen.clone(),
            reason: e.to_string(),
        })?;

    let service = Arc::new(TreeService::new(&config));
    info!(
        sources = config.sources.len(),
        max_workers = config.refresh.max_workers,
        listen = %addr,
        "starting canopy"
    );
    for source in service.store().source_names() {
        tracing::debug!(source = %source, "configured source");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CanopyError::io(format!("binding {addr}"), e))?;

    axum::serve(listener, server::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CanopyError::io("serving http", e))?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, shutting down"),
        Err(e) => {
            warn!(error = %e, "failed to install ctrl-c handler");
            // Without a signal handler there is nothing to wait for;
            // park this future so the server keeps running.
            std::future::pending::<()>().await;
        }
    }
}
