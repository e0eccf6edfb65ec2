use anyhow::{Context, Result};
use tracing::info;

use weather_relay::{AppState, RelayConfig, logging, web};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RelayConfig::load().context("Failed to load configuration")?;
    logging::init(&config.logging)?;

    let state = AppState::from_config(&config).context("Failed to set up services")?;
    info!(
        "Persistence {}",
        if state.sink.is_configured() {
            "enabled"
        } else {
            "disabled"
        }
    );

    web::run(&config, state).await
}
