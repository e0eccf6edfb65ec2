//! Configuration management for the weather relay
//!
//! Handles loading configuration from an optional TOML file and environment
//! variables, and validates every setting before the server starts.

use crate::RelayError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "WEATHER_RELAY_CONFIG";

/// Root configuration structure for the weather relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub geolocation: GeolocationConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory with the front-end bundle
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// PEM certificate, enables HTTPS together with `tls_key`
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
}

/// Persistence store settings. No `path` means persistence is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database directory
    pub path: Option<String>,
    /// Keyspace holding the weather documents
    #[serde(default = "default_store_namespace")]
    pub namespace: String,
}

/// IP geolocation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default = "default_geolocation_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

/// Forecast service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_base_url")]
    pub base_url: String,
    /// `auto` lets the service pick the zone of the queried coordinate
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_past_days")]
    pub past_days: u32,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
    /// Hourly parameters, empty to skip the hourly section
    #[serde(default = "default_hourly")]
    pub hourly: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

/// Location used whenever geolocation yields nothing usable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_latitude")]
    pub latitude: f64,
    #[serde(default = "default_fallback_longitude")]
    pub longitude: f64,
    #[serde(default = "default_fallback_name")]
    pub name: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "public".to_string()
}

fn default_store_namespace() -> String {
    "observations".to_string()
}

fn default_geolocation_base_url() -> String {
    "https://ipapi.co".to_string()
}

fn default_forecast_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_timezone() -> String {
    "auto".to_string()
}

fn default_past_days() -> u32 {
    5
}

fn default_forecast_days() -> u32 {
    1
}

fn default_hourly() -> Vec<String> {
    ["temperature_2m", "relative_humidity_2m", "precipitation", "cloud_cover"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timeout() -> u32 {
    30
}

fn default_fallback_latitude() -> f64 {
    13.7563
}

fn default_fallback_longitude() -> f64 {
    100.5018
}

fn default_fallback_name() -> String {
    "Bangkok (fallback)".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            namespace: default_store_namespace(),
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            base_url: default_geolocation_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_base_url(),
            timezone: default_timezone(),
            past_days: default_past_days(),
            forecast_days: default_forecast_days(),
            hourly: default_hourly(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            latitude: default_fallback_latitude(),
            longitude: default_fallback_longitude(),
            name: default_fallback_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            geolocation: GeolocationConfig::default(),
            forecast: ForecastConfig::default(),
            fallback: FallbackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load_from_path(path)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| PathBuf::from("relay.toml"));

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // RELAY_SERVER__PORT, RELAY_STORE__PATH, ...
        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("forecast.hourly")
                .try_parsing(true),
        );

        // Plain variables of the original deployment take precedence
        builder = builder
            .set_override_option("server.port", env_non_empty("PORT"))
            .with_context(|| "Invalid PORT")?
            .set_override_option("store.path", env_non_empty("STORE_PATH"))
            .with_context(|| "Invalid STORE_PATH")?
            .set_override_option("store.namespace", env_non_empty("STORE_NAMESPACE"))
            .with_context(|| "Invalid STORE_NAMESPACE")?;

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: RelayConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = default_host();
        }
        if self.server.static_dir.is_empty() {
            self.server.static_dir = default_static_dir();
        }
        if self.store.path.as_deref().is_some_and(|p| p.trim().is_empty()) {
            self.store.path = None;
        }
        if self.store.namespace.is_empty() {
            self.store.namespace = default_store_namespace();
        }
        if self.geolocation.base_url.is_empty() {
            self.geolocation.base_url = default_geolocation_base_url();
        }
        if self.geolocation.timeout_seconds == 0 {
            self.geolocation.timeout_seconds = default_timeout();
        }
        if self.forecast.base_url.is_empty() {
            self.forecast.base_url = default_forecast_base_url();
        }
        if self.forecast.timezone.is_empty() {
            self.forecast.timezone = default_timezone();
        }
        if self.forecast.timeout_seconds == 0 {
            self.forecast.timeout_seconds = default_timeout();
        }
        if self.fallback.name.is_empty() {
            self.fallback.name = default_fallback_name();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Whether a persistence store is configured
    #[must_use]
    pub fn persistence_enabled(&self) -> bool {
        self.store.path.is_some()
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(RelayError::config("Server port must be non-zero").into());
        }

        for (name, timeout) in [
            ("Geolocation", self.geolocation.timeout_seconds),
            ("Forecast", self.forecast.timeout_seconds),
        ] {
            if timeout > 300 {
                return Err(RelayError::config(format!(
                    "{name} timeout cannot exceed 300 seconds"
                ))
                .into());
            }
        }

        if self.forecast.past_days > 92 {
            return Err(RelayError::config("Forecast past_days cannot exceed 92").into());
        }

        if self.forecast.forecast_days > 16 {
            return Err(RelayError::config("Forecast forecast_days cannot exceed 16").into());
        }

        if !(-90.0..=90.0).contains(&self.fallback.latitude)
            || !(-180.0..=180.0).contains(&self.fallback.longitude)
        {
            return Err(RelayError::config("Fallback coordinates are out of range").into());
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(RelayError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(RelayError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Geolocation", &self.geolocation.base_url),
            ("Forecast", &self.forecast.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(RelayError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        let namespace_ok = !self.store.namespace.is_empty()
            && self.store.namespace.len() <= 255
            && self
                .store
                .namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !namespace_ok {
            return Err(RelayError::config(format!(
                "Invalid store namespace '{}'. Use letters, digits, '_' or '-'",
                self.store.namespace
            ))
            .into());
        }

        if self.server.tls_cert.is_some() != self.server.tls_key.is_some() {
            return Err(
                RelayError::config("tls_cert and tls_key must be configured together").into(),
            );
        }

        Ok(())
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
