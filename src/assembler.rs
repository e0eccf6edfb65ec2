//! Builds [`WeatherDocument`]s from a resolved location and a forecast

use chrono::{DateTime, Utc};

use crate::models::{ForecastPayload, Location, Sources, WeatherDocument};

/// Combine a location, a forecast payload and the capture time into a
/// document. Sections missing from the payload stay absent.
#[must_use]
pub fn assemble(
    location: Location,
    payload: ForecastPayload,
    captured_at: DateTime<Utc>,
    sources: Option<Sources>,
) -> WeatherDocument {
    let ForecastPayload {
        current,
        daily,
        hourly,
        units,
        raw,
        ..
    } = payload;

    WeatherDocument {
        fetched_at: captured_at,
        location,
        current,
        daily,
        hourly,
        units,
        sources,
        raw: (!raw.is_null()).then_some(raw),
    }
}
