//! StageFlow Shield server binary

use anyhow::{bail, Result};
use stageflow_shield::config::{load_config, validate_config};
use stageflow_shield::{telemetry, Server};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = load_config()?;

    telemetry::init(&config.logging);

    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        bail!("configuration has {} problem(s)", errors.len());
    }

    info!(
        "Starting StageFlow Shield v{}",
        env!("CARGO_PKG_VERSION")
    );

    let server = Server::new(config)?;
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}
