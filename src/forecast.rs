//! Forecast client for the Open-Meteo API
//!
//! Requests current conditions plus a trailing window of daily aggregates
//! for one coordinate. Failures are returned to the caller untouched; there
//! is no retry and no caching.

use std::time::{Duration, Instant};

use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::ForecastConfig;
use crate::models::ForecastPayload;
use crate::{RelayError, Result};

const SERVICE: &str = "forecast";

/// Parameters requested for the `current` section
pub const CURRENT_PARAMETERS: &[&str] =
    &["temperature_2m", "wind_speed_10m", "relative_humidity_2m"];

/// Parameters requested for the `daily` section
pub const DAILY_PARAMETERS: &[&str] = &[
    "temperature_2m_max",
    "temperature_2m_min",
    "precipitation_sum",
    "wind_speed_10m_max",
];

/// Forecast API client
#[derive(Debug, Clone)]
pub struct ForecastClient {
    client: Client,
    endpoint: String,
    timezone: String,
    past_days: u32,
    forecast_days: u32,
    hourly: Vec<String>,
}

impl ForecastClient {
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("weather-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/forecast", config.base_url.trim_end_matches('/')),
            timezone: config.timezone.clone(),
            past_days: config.past_days,
            forecast_days: config.forecast_days,
            hourly: config.hourly.clone(),
        })
    }

    fn query(&self, latitude: f64, longitude: f64) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("timezone", self.timezone.clone()),
            ("current", CURRENT_PARAMETERS.join(",")),
            ("daily", DAILY_PARAMETERS.join(",")),
            ("past_days", self.past_days.to_string()),
            ("forecast_days", self.forecast_days.to_string()),
        ];
        if !self.hourly.is_empty() {
            query.push(("hourly", self.hourly.join(",")));
        }
        query
    }

    /// Exact URL a fetch for this coordinate requests
    pub fn request_url(&self, latitude: f64, longitude: f64) -> Result<Url> {
        Url::parse_with_params(&self.endpoint, self.query(latitude, longitude))
            .map_err(|e| RelayError::config(format!("Invalid forecast URL: {e}")))
    }

    /// Fetch current and recent daily weather for a coordinate
    #[instrument(skip(self))]
    pub async fn fetch_forecast(&self, latitude: f64, longitude: f64) -> Result<ForecastPayload> {
        let url = self.request_url(latitude, longitude)?;
        debug!("Open-Meteo request URL: {}", url);
        let start_time = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::network(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Forecast service answered HTTP {}", status.as_u16());
            return Err(RelayError::upstream(SERVICE, status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RelayError::invalid_response(SERVICE, e.to_string()))?;

        info!(
            "Retrieved forecast for {:.4}, {:.4} in {:.3}s",
            latitude,
            longitude,
            start_time.elapsed().as_secs_f64()
        );

        Ok(ForecastPayload::from_value(body))
    }
}
