//! Configuration file loading.

use crate::models::error::{codes, GatewayError};
use crate::models::settings::Settings;
use std::env;

/// Resolves the configuration file path.
///
/// Uses `PORTICO_CONFIG_PATH` when set, `./config.json` otherwise.
pub fn config_path() -> String {
    env::var("PORTICO_CONFIG_PATH").unwrap_or_else(|_| "./config.json".to_string())
}

/// Loads settings from the configured path.
///
/// # Errors
///
/// - `Config.Load` when the file cannot be read
/// - `Config.Invalid` when the file is not valid JSON for the settings
///   schema
///
/// # Examples
///
/// ```no_run
/// use portico_rs::config::settings::load_settings;
///
/// let settings = load_settings().expect("Failed to load configuration");
/// settings.validate().expect("Invalid configuration");
/// println!("Loaded {} routes", settings.routes.len());
/// ```
pub fn load_settings() -> Result<Settings, GatewayError> {
    load_settings_from_path(&config_path())
}

/// Loads settings from an explicit path.
pub fn load_settings_from_path(path: &str) -> Result<Settings, GatewayError> {
    let content = std::fs::read_to_string(path).map_err(|error| {
        GatewayError::failure(
            codes::CONFIG_LOAD,
            format!("failed to read configuration file {path:?}: {error}"),
        )
    })?;

    serde_json::from_str(&content).map_err(|error| {
        GatewayError::validation(
            codes::CONFIG_INVALID,
            format!("failed to parse configuration file {path:?}: {error}"),
        )
    })
}
