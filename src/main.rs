//! Photo Relay - upload form that stores photos in S3
//!
//! Serves a single-page form and relays each submitted file to the
//! configured bucket as a publicly readable object.

use anyhow::Context;
use clap::Parser;
use photo_relay::metrics::server::MetricsServer;
use photo_relay::server::{AppContext, Server};
use photo_relay::{config::Config, logging};
use std::path::PathBuf;
use tracing::info;

/// Photo Relay - browser uploads straight into an S3 bucket
#[derive(Parser, Debug)]
#[command(name = "photo-relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (environment variables only when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding configuration and PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => Config::from_env().context("Failed to load configuration from environment")?,
    };
    if let Some(port) = args.port {
        config.server.port = Some(port);
    }

    // Initialize logging
    logging::init(&config.logging, args.log_level.as_deref())?;

    info!("Starting Photo Relay v{}", photo_relay::VERSION);
    match &args.config {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("Loaded configuration from environment"),
    }

    let context = AppContext::from_config(&config).await?;

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(format!("{}:{}", config.server.host, config.metrics.port));
        let addr = server.start().await?;
        info!("Metrics available at http://{}/metrics", addr);
        Some(server)
    } else {
        None
    };

    // Start server
    let server = Server::bind(&config.server, context).await?;
    server.run().await?;

    if let Some(metrics) = metrics_server.as_mut() {
        metrics.shutdown().await;
    }

    Ok(())
}
