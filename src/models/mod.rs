//! Data models for the weather relay
//!
//! - Location: where a visitor is (or is assumed to be)
//! - Document: the assembled weather snapshot that is served and stored
//! - Forecast: lenient decoding of the forecast service response

pub mod document;
pub mod forecast;
pub mod location;

pub use document::{CurrentConditions, DailyEntry, DailySeries, Sources, Units, WeatherDocument};
pub use forecast::ForecastPayload;
pub use location::Location;
