//! GSI server binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`GSI_CONFIG`, default `gsi-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the ingestion pipeline and attach the logging consumer
//! 4. Serve HTTP until `Ctrl-C`

use std::path::PathBuf;
use std::sync::Arc;

use gsi_core::config::LoggingConfig;
use gsi_core::{GsiConfig, Pipeline};
use gsi_server::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default configuration file, resolved against the working directory.
const DEFAULT_CONFIG_PATH: &str = "gsi-config.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("GSI_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = GsiConfig::load(&config_path)?;

    init_tracing(&config.logging);

    info!(
        config = %config_path.display(),
        host = config.server.host,
        port = config.server.port,
        auth_enforced = config.tokens.is_enforced(),
        sections = ?config.sections,
        "gsi-server starting"
    );

    let pipeline = Arc::new(Pipeline::new(&config));
    attach_logging_consumer(&pipeline);

    let state = Arc::new(AppState::new(pipeline));
    gsi_server::start_server(&config.server, state).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Log client connections and a few headline changes.
fn attach_logging_consumer(pipeline: &Pipeline) {
    pipeline.on_new_client(|client| {
        info!(
            address = client.address(),
            authenticated = client.auth_token().is_some(),
            "New client connection"
        );

        let address = client.address().to_owned();
        client.on("player:activity", move |activity| {
            if activity.and_then(serde_json::Value::as_str) == Some("playing") {
                info!(address = address.as_str(), "Game started");
            }
        });

        let address = client.address().to_owned();
        client.on("hero:level", move |level| {
            info!(address = address.as_str(), ?level, "Hero level changed");
        });
    });
}
