//! Geolocation Resolution Module
//!
//! Resolves a visitor's network address into a [`Location`] through an
//! ipapi.co-compatible lookup service. Lookup failures never propagate: the
//! resolver answers with the configured fallback location instead.

use std::net::IpAddr;
use std::time::Duration;

use axum::http::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::{FallbackConfig, GeolocationConfig};
use crate::models::Location;
use crate::{RelayError, Result};

/// Outcome of a lookup, kept distinct for logging
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(Location),
    Fallback { location: Location, reason: String },
}

impl Resolution {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            Resolution::Resolved(location) | Resolution::Fallback { location, .. } => location,
        }
    }

    #[must_use]
    pub fn into_location(self) -> Location {
        match self {
            Resolution::Resolved(location) | Resolution::Fallback { location, .. } => location,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }
}

/// Body returned by the lookup service
#[derive(Debug, Deserialize)]
struct GeoResponse {
    ip: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

/// Service for resolving client addresses
#[derive(Debug, Clone)]
pub struct LocationResolver {
    client: Client,
    base_url: String,
    fallback: Location,
}

impl LocationResolver {
    pub fn new(config: &GeolocationConfig, fallback: &FallbackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("weather-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            fallback: Location::new(fallback.latitude, fallback.longitude)
                .with_city(fallback.name.clone()),
        })
    }

    #[must_use]
    pub fn fallback(&self) -> &Location {
        &self.fallback
    }

    /// Lookup URL for `address`, or for the caller's own peer when `None`
    #[must_use]
    pub fn lookup_url(&self, address: Option<&str>) -> String {
        match address {
            Some(ip) => format!("{}/{}/json/", self.base_url, ip),
            None => format!("{}/json/", self.base_url),
        }
    }

    /// Resolve a raw client address into a location. Never fails.
    pub async fn resolve(&self, client_address: Option<&str>) -> Location {
        self.resolve_detailed(client_address).await.into_location()
    }

    #[instrument(skip(self))]
    pub async fn resolve_detailed(&self, client_address: Option<&str>) -> Resolution {
        let address = client_address.and_then(normalize_client_address);

        match self.lookup(address.as_deref()).await {
            Ok(location) => {
                debug!(
                    "Resolved {:?} to {} ({})",
                    address,
                    location.display_label(),
                    location.format_coordinates()
                );
                Resolution::Resolved(location)
            }
            Err(reason) => {
                warn!("Geolocation failed for {:?}, using fallback: {}", address, reason);
                Resolution::Fallback {
                    location: self.fallback.clone(),
                    reason,
                }
            }
        }
    }

    async fn lookup(&self, address: Option<&str>) -> std::result::Result<Location, String> {
        let url = self.lookup_url(address);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("lookup service returned HTTP {}", status.as_u16()));
        }

        let body: GeoResponse = response
            .json()
            .await
            .map_err(|e| format!("unreadable lookup response: {e}"))?;

        if body.error {
            return Err(body.reason.unwrap_or_else(|| "lookup reported an error".into()));
        }

        let (latitude, longitude) = match (body.latitude, body.longitude) {
            (Some(lat), Some(lon)) if usable(lat) && usable(lon) => (lat, lon),
            _ => return Err("no usable coordinates".into()),
        };

        let mut location = Location::new(latitude, longitude);
        if !location.has_valid_coordinates() {
            return Err(format!("coordinates out of range: {latitude}, {longitude}"));
        }
        location.ip = body.ip.or_else(|| address.map(String::from));
        location.city = non_blank(body.city);
        location.region = non_blank(body.region);
        location.country = non_blank(body.country_name);
        Ok(location)
    }
}

fn usable(value: f64) -> bool {
    value.is_finite() && value != 0.0
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reduce a raw client address to the single IP worth looking up.
///
/// Takes the first entry of a forwarding chain, strips an IPv4-mapped IPv6
/// prefix and drops anything that is not an IP address.
#[must_use]
pub fn normalize_client_address(raw: &str) -> Option<String> {
    let first = raw.split(',').next()?.trim();
    let candidate = first
        .strip_prefix("::ffff:")
        .or_else(|| first.strip_prefix("::FFFF:"))
        .unwrap_or(first);

    if candidate.is_empty() {
        return None;
    }

    match candidate.parse::<IpAddr>() {
        Ok(ip) => Some(ip.to_string()),
        Err(_) => {
            debug!("Discarding unparsable client address {:?}", candidate);
            None
        }
    }
}

/// Client address of a request: `X-Forwarded-For`, then `X-Real-IP`, then
/// the socket peer
#[must_use]
pub fn client_address(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<String> {
    ["x-forwarded-for", "x-real-ip"]
        .into_iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|ip| ip.to_string()))
}
