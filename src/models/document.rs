//! The weather document: unit of exchange between server, store and browser

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Location;

/// Current observations keyed by parameter name (`temperature_2m`, ...)
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct CurrentConditions(pub Map<String, Value>);

impl CurrentConditions {
    /// Numeric value of `parameter`, `None` when absent or not a number
    #[must_use]
    pub fn number(&self, parameter: &str) -> Option<f64> {
        self.0.get(parameter).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Daily aggregates as parallel sequences indexed by day.
///
/// Open-Meteo emits `null` for gaps, so every value is optional. Sequences
/// may disagree in length; positions past the end of one read as missing.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct DailySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default, rename = "temperature_2m_max")]
    pub temperature_max: Vec<Option<f64>>,
    #[serde(default, rename = "temperature_2m_min")]
    pub temperature_min: Vec<Option<f64>>,
    #[serde(default, rename = "precipitation_sum")]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default, rename = "wind_speed_10m_max")]
    pub wind_speed_max: Vec<Option<f64>>,
    /// Any further daily parameters, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of a [`DailySeries`]
#[derive(Debug, Clone, PartialEq)]
pub struct DailyEntry<'a> {
    pub date: &'a str,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub precipitation_sum: Option<f64>,
    pub wind_speed_max: Option<f64>,
}

fn at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

impl DailySeries {
    /// Number of days, driven by the `time` sequence
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    #[must_use]
    pub fn entry(&self, index: usize) -> Option<DailyEntry<'_>> {
        let date = self.time.get(index)?;
        Some(DailyEntry {
            date,
            temperature_max: at(&self.temperature_max, index),
            temperature_min: at(&self.temperature_min, index),
            precipitation_sum: at(&self.precipitation_sum, index),
            wind_speed_max: at(&self.wind_speed_max, index),
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = DailyEntry<'_>> {
        (0..self.len()).filter_map(|index| self.entry(index))
    }

    /// Days that are over: every entry except the trailing one.
    ///
    /// The forecast request always asks for `forecast_days=1`, which makes
    /// the service append the current, incomplete day as the last element.
    #[must_use]
    pub fn completed_days(&self) -> Vec<DailyEntry<'_>> {
        let count = self.len().saturating_sub(1);
        self.entries().take(count).collect()
    }
}

/// Unit metadata reported by the forecast service, per section
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Units {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<Map<String, Value>>,
}

impl Units {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.daily.is_none() && self.hourly.is_none()
    }
}

/// Upstream URLs a document was built from
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Sources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<String>,
    pub weather: String,
}

/// A fetched weather snapshot for one location.
///
/// Built once per successful fetch and never updated afterwards.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherDocument {
    /// When the relay assembled the document
    pub fetched_at: DateTime<Utc>,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<DailySeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Sources>,
    /// Full upstream forecast body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(days: usize) -> DailySeries {
        serde_json::from_value(json!({
            "time": (0..days).map(|d| format!("2026-10-{:02}", 10 + d)).collect::<Vec<_>>(),
            "temperature_2m_max": (0..days).map(|d| 30.0 + d as f64).collect::<Vec<_>>(),
            "temperature_2m_min": (0..days).map(|d| 20.0 + d as f64).collect::<Vec<_>>(),
            "precipitation_sum": (0..days).map(|_| 0.0).collect::<Vec<_>>(),
            "wind_speed_10m_max": (0..days).map(|_| 3.5).collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    #[test]
    fn test_completed_days_drops_trailing_entry() {
        let daily = series(6);
        let days = daily.completed_days();
        assert_eq!(days.len(), 5);
        assert_eq!(days[0].date, "2026-10-10");
        assert_eq!(days[4].date, "2026-10-14");
        assert_eq!(days[4].temperature_max, Some(34.0));
    }

    #[test]
    fn test_completed_days_of_empty_series() {
        assert!(DailySeries::default().completed_days().is_empty());
        assert!(series(1).completed_days().is_empty());
    }

    #[test]
    fn test_short_sequences_read_as_missing() {
        let daily: DailySeries = serde_json::from_value(json!({
            "time": ["2026-10-10", "2026-10-11", "2026-10-12"],
            "temperature_2m_max": [31.0, null],
            "temperature_2m_min": [22.5],
        }))
        .unwrap();

        let second = daily.entry(1).unwrap();
        assert_eq!(second.temperature_max, None);
        assert_eq!(second.temperature_min, None);
        let third = daily.entry(2).unwrap();
        assert_eq!(third.precipitation_sum, None);
        assert!(daily.entry(3).is_none());
    }

    #[test]
    fn test_unknown_daily_parameters_survive() {
        let daily: DailySeries = serde_json::from_value(json!({
            "time": ["2026-10-10"],
            "uv_index_max": [7.1],
        }))
        .unwrap();
        assert_eq!(daily.extra.get("uv_index_max"), Some(&json!([7.1])));
        let back = serde_json::to_value(&daily).unwrap();
        assert_eq!(back["uv_index_max"], json!([7.1]));
    }

    #[test]
    fn test_current_number_lookup() {
        let current: CurrentConditions =
            serde_json::from_value(json!({"temperature_2m": 21.4, "time": "2026-10-18T10:00"}))
                .unwrap();
        assert_eq!(current.number("temperature_2m"), Some(21.4));
        assert_eq!(current.number("time"), None);
        assert_eq!(current.number("wind_speed_10m"), None);
    }

    #[test]
    fn test_document_uses_camel_case_and_omits_absent_sections() {
        let document = WeatherDocument {
            fetched_at: "2026-10-18T03:00:00Z".parse().unwrap(),
            location: Location::new(13.7563, 100.5018),
            current: None,
            daily: None,
            hourly: None,
            units: None,
            sources: None,
            raw: None,
        };
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["fetchedAt"], "2026-10-18T03:00:00Z");
        assert!(json.get("current").is_none());
        assert!(json.get("raw").is_none());
    }
}
