//! Lenient view over an Open-Meteo forecast response

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::{CurrentConditions, DailySeries, Units};

/// Forecast response split into sections.
///
/// Each section is decoded on its own; a section that is missing or does
/// not have the expected shape is left as `None`. The untouched body is kept
/// in `raw`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPayload {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub current: Option<CurrentConditions>,
    pub daily: Option<DailySeries>,
    pub hourly: Option<Value>,
    pub units: Option<Units>,
    pub raw: Value,
}

impl ForecastPayload {
    #[must_use]
    pub fn from_value(raw: Value) -> Self {
        let units = Units {
            current: section::<Map<String, Value>>(&raw, "current_units"),
            daily: section::<Map<String, Value>>(&raw, "daily_units"),
            hourly: section::<Map<String, Value>>(&raw, "hourly_units"),
        };

        Self {
            latitude: raw.get("latitude").and_then(Value::as_f64),
            longitude: raw.get("longitude").and_then(Value::as_f64),
            timezone: raw.get("timezone").and_then(Value::as_str).map(String::from),
            current: section(&raw, "current"),
            daily: section(&raw, "daily"),
            hourly: raw.get("hourly").filter(|v| v.is_object()).cloned(),
            units: (!units.is_empty()).then_some(units),
            raw,
        }
    }
}

fn section<T: DeserializeOwned>(raw: &Value, key: &str) -> Option<T> {
    let value = raw.get(key).filter(|v| !v.is_null())?.clone();
    serde_json::from_value(value)
        .map_err(|e| debug!("Ignoring malformed '{}' section: {}", key, e))
        .ok()
}
