pub mod agent;
pub mod doctor;
pub mod gateway;
pub mod onboard;

use pennywise_config::AppConfig;

/// Load config, turning failures into a message that names the file.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| {
        format!(
            "Failed to load config from {}: {e}",
            AppConfig::config_path().display()
        )
    })?;
    tracing::debug!(
        provider = %config.default_provider,
        ledger = %config.ledger.backend,
        "Config loaded"
    );
    Ok(config)
}
