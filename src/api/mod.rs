use std::net::SocketAddr;

use axum::{
    Router,
    extract::{ConnectInfo, Query, Request, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    RelayError, Result,
    assembler::assemble,
    config::RelayConfig,
    forecast::ForecastClient,
    geolocation::{LocationResolver, client_address, normalize_client_address},
    models::{Location, Sources, WeatherDocument},
    render::Dashboard,
    store::{DocumentSink, Latest},
};

/// City reported by the direct-coordinate endpoint when called without
/// coordinates
const DEFAULT_CITY: &str = "Bangkok";

const NOT_CONFIGURED_MESSAGE: &str =
    "Persistence is not configured on this server. Press \"Fetch now\" to load current weather.";
const EMPTY_MESSAGE: &str = "No weather data stored yet. Press \"Fetch now\" first.";

/// Shared handles injected into every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub resolver: LocationResolver,
    pub forecast: ForecastClient,
    pub sink: DocumentSink,
}

impl AppState {
    #[must_use]
    pub fn new(resolver: LocationResolver, forecast: ForecastClient, sink: DocumentSink) -> Self {
        Self {
            resolver,
            forecast,
            sink,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Ok(Self::new(
            LocationResolver::new(&config.geolocation, &config.fallback)?,
            ForecastClient::new(&config.forecast)?,
            DocumentSink::open(&config.store),
        ))
    }

    /// Forecast, assemble and store a document for an already known location
    pub async fn fetch_document(
        &self,
        location: Location,
        geolocation_url: Option<String>,
    ) -> Result<WeatherDocument> {
        let (latitude, longitude) = (location.latitude, location.longitude);
        let weather_url = self.forecast.request_url(latitude, longitude)?.to_string();
        let payload = self.forecast.fetch_forecast(latitude, longitude).await?;

        let document = assemble(
            location,
            payload,
            Utc::now(),
            Some(Sources {
                geolocation: geolocation_url,
                weather: weather_url,
            }),
        );

        self.sink.append(&document).await;
        Ok(document)
    }

    /// Geolocate a raw client address, then fetch its weather
    pub async fn fetch_for_client(&self, raw_address: Option<&str>) -> Result<WeatherDocument> {
        let address = raw_address.and_then(normalize_client_address);
        let geolocation_url = self.resolver.lookup_url(address.as_deref());
        let location = self.resolver.resolve(address.as_deref()).await;
        self.fetch_document(location, Some(geolocation_url)).await
    }
}

/// Error response: `{ ok: false, kind, error, message }`
#[derive(Debug)]
pub struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RelayError::Network { .. }
            | RelayError::Upstream { .. }
            | RelayError::InvalidResponse { .. } => StatusCode::BAD_GATEWAY,
            RelayError::Validation { .. } => StatusCode::BAD_REQUEST,
            RelayError::Config { .. } | RelayError::Store { .. } | RelayError::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = json!({
            "ok": false,
            "kind": self.0.kind(),
            "error": self.0.to_string(),
            "message": self.0.user_message(),
        });
        (status, Json(body)).into_response()
    }
}

/// Query of the direct-coordinate endpoint
#[derive(Debug, Default, Deserialize)]
pub struct CoordinateQuery {
    #[serde(alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(alias = "longitude")]
    pub lon: Option<f64>,
    #[serde(alias = "name")]
    pub city: Option<String>,
}

impl CoordinateQuery {
    /// Location requested by the query; without coordinates the fallback
    /// coordinate is used
    pub fn location(&self, fallback: &Location) -> Result<Location> {
        let mut location = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                let location = Location::new(lat, lon);
                if !location.has_valid_coordinates() {
                    return Err(RelayError::validation(format!(
                        "coordinates out of range: {lat}, {lon}"
                    )));
                }
                let name = location.format_coordinates();
                location.with_city(name)
            }
            (None, None) => {
                Location::new(fallback.latitude, fallback.longitude).with_city(DEFAULT_CITY)
            }
            _ => {
                return Err(RelayError::validation(
                    "lat and lon must be given together",
                ));
            }
        };

        if let Some(city) = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            location.city = Some(city.to_string());
        }
        Ok(location)
    }
}

/// Body of the "latest" endpoints
#[derive(Debug, Serialize)]
pub struct LatestResponse<T> {
    pub configured: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl<T> LatestResponse<T> {
    fn from_latest(latest: Latest, view: impl FnOnce(WeatherDocument) -> T) -> Self {
        let configured = latest.configured();
        match latest {
            Latest::Found(stored) => Self {
                configured,
                data: Some(view(stored.document)),
                id: Some(stored.id),
                message: None,
            },
            Latest::Empty => Self {
                configured,
                data: None,
                id: None,
                message: Some(EMPTY_MESSAGE),
            },
            Latest::NotConfigured => Self {
                configured,
                data: None,
                id: None,
                message: Some(NOT_CONFIGURED_MESSAGE),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub ok: bool,
    pub time: DateTime<Utc>,
    pub version: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/weather", get(weather_by_coordinates))
        .route("/weather/by-ip", get(weather_by_ip))
        .route("/latest", get(latest))
        .route("/health", get(health))
        .route("/view/now", get(view_now))
        .route("/view/latest", get(view_latest))
        .with_state(state)
}

fn request_client_address(request: &Request) -> Option<String> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    client_address(request.headers(), peer)
}

async fn weather_by_coordinates(
    State(state): State<AppState>,
    query: std::result::Result<Query<CoordinateQuery>, QueryRejection>,
) -> std::result::Result<Json<WeatherDocument>, ApiError> {
    let Query(query) = query.map_err(|e| RelayError::validation(e.body_text()))?;
    let location = query.location(state.resolver.fallback())?;

    let document = state.fetch_document(location, None).await?;
    info!("Served weather for {}", document.location.display_label());
    Ok(Json(document))
}

async fn weather_by_ip(
    State(state): State<AppState>,
    request: Request,
) -> std::result::Result<Json<WeatherDocument>, ApiError> {
    let address = request_client_address(&request);
    let document = state.fetch_for_client(address.as_deref()).await?;
    info!("Served weather for {}", document.location.display_label());
    Ok(Json(document))
}

async fn latest(
    State(state): State<AppState>,
) -> std::result::Result<Json<LatestResponse<WeatherDocument>>, ApiError> {
    let latest = state.sink.latest().await?;
    Ok(Json(LatestResponse::from_latest(latest, |document| document)))
}

async fn health() -> Json<Health> {
    Json(Health {
        ok: true,
        time: Utc::now(),
        version: crate::VERSION,
    })
}

async fn view_now(
    State(state): State<AppState>,
    request: Request,
) -> std::result::Result<Json<Dashboard>, ApiError> {
    let address = request_client_address(&request);
    let document = state.fetch_for_client(address.as_deref()).await?;
    Ok(Json(Dashboard::from_document(&document)))
}

async fn view_latest(
    State(state): State<AppState>,
) -> std::result::Result<Json<LatestResponse<Dashboard>>, ApiError> {
    let latest = state.sink.latest().await?;
    Ok(Json(LatestResponse::from_latest(latest, |document| {
        Dashboard::from_document(&document)
    })))
}
