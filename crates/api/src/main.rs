//! Flood Monitoring Server - Main Entry Point

use api::{init_logging, run_server, ServerError, ServiceConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = ServiceConfig::from_env()?;
    init_logging(&config.log_level, config.log_json)?;

    info!("=== FloodWatch v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Storage backend: {:?}, flood threshold: {} cm",
        config.storage_backend, config.flood_threshold_cm
    );

    run_server(config).await
}
