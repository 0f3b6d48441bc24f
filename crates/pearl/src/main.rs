//! Pearl - on-the-fly image transformation gateway.
//!
//! Pearl serves images from a filesystem directory, an HTTP origin or an S3
//! bucket, resized, cropped and blurred according to the request.
//!
//! # Usage
//!
//! ```bash
//! # Write a starter config
//! pearl config init
//!
//! # Validate it
//! pearl config check
//!
//! # Serve
//! pearl serve --port 8080
//! curl 'http://localhost:8080/images/cat.jpg?w=200&h=200&scale_mode=aspect_crop'
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pearl_core::config::LoggingConfig;
use pearl_core::Config;

mod cli;
mod logging;
mod server;

/// Pearl - on-the-fly image transformation gateway.
#[derive(Parser, Debug)]
#[command(name = "pearl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "PEARL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gateway
    Serve(cli::serve::ServeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    // Logging comes up before commands run; a broken config is reported by
    // the command itself, so fall back to default logging settings here.
    let logging_config = std::fs::read_to_string(&config_path)
        .ok()
        .and_then(|content| logging_section(&content))
        .unwrap_or_default();
    logging::init_from_config(&logging_config, cli.verbose, cli.json_logs);

    tracing::debug!("Pearl v{}", pearl_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args, &config_path).await,
        Commands::Config(args) => cli::config::execute(args, &config_path).await,
    }
}

/// Just the `[logging]` table, so logging works even when the rest of the
/// file does not validate.
fn logging_section(content: &str) -> Option<LoggingConfig> {
    #[derive(serde::Deserialize)]
    struct Partial {
        #[serde(default)]
        logging: LoggingConfig,
    }
    toml::from_str::<Partial>(content).ok().map(|p| p.logging)
}
