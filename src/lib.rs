//! `weather-relay` - IP-located weather lookups
//!
//! Resolves a visitor's location from their network address, fetches
//! current and recent daily weather from Open-Meteo, optionally stores the
//! result and serves it, together with a small dashboard, over HTTP.

pub mod api;
pub mod assembler;
pub mod config;
pub mod error;
pub mod forecast;
pub mod geolocation;
pub mod logging;
pub mod models;
pub mod render;
pub mod store;
pub mod web;

// Re-export core types for public API
pub use api::AppState;
pub use assembler::assemble;
pub use config::RelayConfig;
pub use error::RelayError;
pub use forecast::ForecastClient;
pub use geolocation::{LocationResolver, Resolution};
pub use models::{DailySeries, ForecastPayload, Location, WeatherDocument};
pub use render::Dashboard;
pub use store::{DocumentSink, DocumentStore, FjallStore, Latest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, RelayError>;
