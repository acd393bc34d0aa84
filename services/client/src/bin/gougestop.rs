//! services/client/src/bin/gougestop.rs

use client_lib::{
    adapters::{FileSessionStore, HttpBackendAdapter},
    cli::{run, Cli},
    config::Config,
    error::ClientError,
};
use clap::Parser;
use gougestop_core::flow::FlowPorts;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Backend at {}", config.api_url);

    // --- 2. Initialize Adapters ---
    let backend = Arc::new(HttpBackendAdapter::new(
        config.api_url.clone(),
        config.request_timeout,
    )?);
    let store = Arc::new(FileSessionStore::new(config.token_path.clone()));

    let ports = FlowPorts {
        auth: backend.clone(),
        analysis: backend.clone(),
        billing: backend.clone(),
        sharing: backend,
        store,
    };

    // --- 3. Run the Requested Command ---
    run(cli.command, config, ports).await
}
