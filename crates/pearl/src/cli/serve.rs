//! The `pearl serve` command.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use pearl_core::{Config, Gateway, SourceRegistry};

use crate::server;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,
}

/// Execute the serve command. Any configuration error stops startup.
pub async fn execute(args: ServeArgs, config_path: &Path) -> anyhow::Result<()> {
    let mut config = Config::load_from(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    let gateway = Gateway::from_config(&config, &SourceRegistry::builtin())?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to address {bind_addr}"))?;

    tracing::info!(
        version = pearl_core::VERSION,
        address = %listener.local_addr()?,
        routes = config.routes.len(),
        "Pearl listening"
    );

    server::run(
        listener,
        Arc::new(gateway),
        Duration::from_secs(config.server.write_timeout_secs),
        server::shutdown_signal(),
    )
    .await
    .context("Server error")?;

    tracing::info!("Server shut down gracefully.");
    Ok(())
}
