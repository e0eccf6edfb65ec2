//! Dashboard view model
//!
//! Turns a [`WeatherDocument`] into the pre-shaped strings, chart series and
//! map marker the browser displays. Every missing value is mapped to a
//! placeholder here, so the page never has to check for absent fields.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{DailyEntry, Location, WeatherDocument};

/// Shown in place of a missing number
pub const PLACEHOLDER: &str = "-";

/// Map centre used when a document carries no usable coordinate
pub const DEFAULT_MAP_CENTER: (f64, f64) = (13.736, 100.523);

pub const MAP_ZOOM: u8 = 11;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub now: NowPanel,
    pub days: Vec<DayCard>,
    pub chart: ChartData,
    pub map: MapMarker,
}

/// Current conditions panel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPanel {
    pub location: String,
    pub fetched_at: DateTime<Utc>,
    pub fetched_at_text: String,
    /// `(lat, lon)` to four decimals, empty without coordinates
    pub coordinates: String,
    pub temperature: String,
    pub humidity: String,
    pub wind: String,
}

/// One completed day of history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCard {
    pub date: String,
    pub label: String,
    pub temperature_max: String,
    pub temperature_min: String,
    pub precipitation: String,
    pub wind_max: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub label: String,
    pub data: Vec<Option<f64>>,
}

/// Line chart input: labels plus max/min temperature series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
    pub popup: String,
}

/// Rounded number, or [`PLACEHOLDER`] when missing
#[must_use]
pub fn placeholder_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}", v.round() as i64),
        _ => PLACEHOLDER.to_string(),
    }
}

fn unit<'a>(units: Option<&'a Map<String, Value>>, parameter: &str) -> Option<&'a str> {
    units?.get(parameter)?.as_str()
}

fn reading(value: Option<f64>, unit: Option<&str>, missing: &str) -> String {
    match (value.filter(|v| v.is_finite()), unit) {
        (Some(v), Some(unit)) => format!("{v} {unit}"),
        (Some(v), None) => v.to_string(),
        (None, _) => missing.to_string(),
    }
}

fn day_label(date: &str, format: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|day| day.format(format).to_string())
        .unwrap_or_else(|_| date.to_string())
}

fn has_position(location: &Location) -> bool {
    location.has_valid_coordinates() && location.latitude != 0.0 && location.longitude != 0.0
}

impl Dashboard {
    #[must_use]
    pub fn from_document(document: &WeatherDocument) -> Self {
        let days = document
            .daily
            .as_ref()
            .map(|daily| daily.completed_days())
            .unwrap_or_default();

        Self {
            now: NowPanel::from_document(document),
            chart: ChartData::from_days(&days),
            days: days.iter().map(DayCard::from_entry).collect(),
            map: MapMarker::for_location(&document.location),
        }
    }
}

impl NowPanel {
    fn from_document(document: &WeatherDocument) -> Self {
        let current = document.current.as_ref();
        let number = |parameter: &str| current.and_then(|c| c.number(parameter));
        let units = document.units.as_ref().and_then(|u| u.current.as_ref());
        let location = &document.location;

        let temperature = match number("temperature_2m").filter(|v| v.is_finite()) {
            Some(v) => format!("{v}°C"),
            None => "--°C".to_string(),
        };

        Self {
            location: location.display_label(),
            fetched_at: document.fetched_at,
            fetched_at_text: document.fetched_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            coordinates: if has_position(location) {
                format!("({})", location.format_coordinates())
            } else {
                String::new()
            },
            temperature,
            humidity: reading(
                number("relative_humidity_2m"),
                unit(units, "relative_humidity_2m"),
                PLACEHOLDER,
            ),
            wind: reading(
                number("wind_speed_10m"),
                unit(units, "wind_speed_10m"),
                PLACEHOLDER,
            ),
        }
    }
}

impl DayCard {
    fn from_entry(entry: &DailyEntry<'_>) -> Self {
        Self {
            date: entry.date.to_string(),
            label: day_label(entry.date, "%a %d %b"),
            temperature_max: placeholder_number(entry.temperature_max),
            temperature_min: placeholder_number(entry.temperature_min),
            precipitation: placeholder_number(entry.precipitation_sum),
            wind_max: placeholder_number(entry.wind_speed_max),
        }
    }
}

impl ChartData {
    fn from_days(days: &[DailyEntry<'_>]) -> Self {
        Self {
            labels: days.iter().map(|d| day_label(d.date, "%d %b")).collect(),
            series: vec![
                ChartSeries {
                    label: "Max temperature (°C)".to_string(),
                    data: days.iter().map(|d| d.temperature_max).collect(),
                },
                ChartSeries {
                    label: "Min temperature (°C)".to_string(),
                    data: days.iter().map(|d| d.temperature_min).collect(),
                },
            ],
        }
    }
}

impl MapMarker {
    fn for_location(location: &Location) -> Self {
        let (latitude, longitude) = if has_position(location) {
            (location.latitude, location.longitude)
        } else {
            DEFAULT_MAP_CENTER
        };

        Self {
            latitude,
            longitude,
            zoom: MAP_ZOOM,
            popup: location
                .city
                .clone()
                .filter(|city| !city.trim().is_empty())
                .unwrap_or_else(|| "Your location".to_string()),
        }
    }
}
