//! End-to-end scenarios for the HTTP surface with mocked upstream services

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_relay::{AppState, RelayConfig, web};

struct Harness {
    geolocation: MockServer,
    forecast: MockServer,
    store_dir: Option<TempDir>,
}

impl Harness {
    async fn new(with_store: bool) -> Self {
        Self {
            geolocation: MockServer::start().await,
            forecast: MockServer::start().await,
            store_dir: with_store.then(|| tempfile::tempdir().unwrap()),
        }
    }

    fn app(&self) -> Router {
        let mut config = RelayConfig::default();
        config.geolocation.base_url = self.geolocation.uri();
        config.forecast.base_url = self.forecast.uri();
        config.store.path = self
            .store_dir
            .as_ref()
            .map(|dir| dir.path().to_string_lossy().into_owned());

        let state = AppState::from_config(&config).unwrap();
        web::app(state, "public")
    }

    async fn mount_forecast_ok(&self, temperature: f64) {
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(temperature)))
            .mount(&self.forecast)
            .await;
    }
}

fn forecast_body(temperature: f64) -> Value {
    json!({
        "latitude": 35.7,
        "longitude": 139.7,
        "timezone": "Asia/Tokyo",
        "current_units": {"temperature_2m": "°C", "relative_humidity_2m": "%", "wind_speed_10m": "km/h"},
        "current": {
            "time": "2026-10-18T12:00",
            "temperature_2m": temperature,
            "relative_humidity_2m": 64,
            "wind_speed_10m": 11.2
        },
        "daily": {
            "time": ["2026-10-13", "2026-10-14", "2026-10-15", "2026-10-16", "2026-10-17", "2026-10-18"],
            "temperature_2m_max": [22.1, 23.4, 21.0, 24.8, 25.2, 23.0],
            "temperature_2m_min": [15.0, 16.2, 14.8, 17.1, 18.0, 16.5],
            "precipitation_sum": [0.0, 4.2, 11.8, 0.0, 0.0, 0.3],
            "wind_speed_10m_max": [12.0, 18.4, 22.9, 9.1, 8.7, 10.0]
        }
    })
}

async fn get(app: Router, uri: &str, forwarded_for: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::get(uri);
    if let Some(address) = forwarded_for {
        request = request.header("x-forwarded-for", address);
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn scenario_a_address_geolocates_and_fetches_weather() {
    let harness = Harness::new(false).await;
    Mock::given(method("GET"))
        .and(path("/203.0.113.5/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ip": "203.0.113.5",
            "city": "Tokyo",
            "region": "Tokyo",
            "country_name": "Japan",
            "latitude": 35.68,
            "longitude": 139.69
        })))
        .expect(1)
        .mount(&harness.geolocation)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("latitude", "35.68"))
        .and(query_param("longitude", "139.69"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(21.4)))
        .expect(1)
        .mount(&harness.forecast)
        .await;

    let (status, body) = get(
        harness.app(),
        "/api/weather/by-ip",
        Some("203.0.113.5, 10.0.0.1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"]["temperature_2m"], 21.4);
    assert_eq!(body["location"]["city"], "Tokyo");
    assert_eq!(body["location"]["latitude"], 35.68);
    assert_eq!(
        body["sources"]["geolocation"],
        format!("{}/203.0.113.5/json/", harness.geolocation.uri())
    );
    assert_eq!(body["units"]["current"]["temperature_2m"], "°C");
    assert_eq!(body["daily"]["time"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn scenario_b_geolocation_failure_uses_fallback() {
    let harness = Harness::new(false).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&harness.geolocation)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("latitude", "13.7563"))
        .and(query_param("longitude", "100.5018"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(31.0)))
        .expect(1)
        .mount(&harness.forecast)
        .await;

    let (status, body) = get(harness.app(), "/api/weather/by-ip", Some("198.51.100.23")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"]["latitude"], 13.7563);
    assert_eq!(body["location"]["longitude"], 100.5018);
    assert_eq!(body["location"]["city"], "Bangkok (fallback)");
}

#[tokio::test]
async fn scenario_c_forecast_outage_fails_without_storing() {
    let harness = Harness::new(true).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "city": "Tokyo", "latitude": 35.68, "longitude": 139.69
        })))
        .mount(&harness.geolocation)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.forecast)
        .await;

    let app = harness.app();
    let (status, body) = get(app.clone(), "/api/weather/by-ip", Some("203.0.113.5")).await;
    assert!(status.is_server_error());
    assert_eq!(body["ok"], false);
    assert_eq!(body["kind"], "upstream");
    assert!(body["error"].as_str().unwrap().contains("503"));

    let (status, body) = get(app.clone(), "/api/weather?lat=1&lon=2", None).await;
    assert!(status.is_server_error());
    assert_eq!(body["kind"], "upstream");

    let (_, latest) = get(app, "/api/latest", None).await;
    assert_eq!(latest["configured"], true);
    assert!(latest["data"].is_null());
}

#[tokio::test]
async fn scenario_d_latest_without_persistence() {
    let harness = Harness::new(false).await;
    let app = harness.app();

    for _ in 0..2 {
        let (status, body) = get(app.clone(), "/api/latest", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["configured"], false);
        assert!(body["data"].is_null());
    }

    let (status, body) = get(app, "/api/view/latest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());
    assert!(body["message"].as_str().unwrap().contains("Fetch now"));
}

#[tokio::test]
async fn stored_document_is_served_as_latest() {
    let harness = Harness::new(true).await;
    harness.mount_forecast_ok(19.5).await;

    let app = harness.app();
    let before: DateTime<Utc> = Utc::now();
    let (status, fetched) = get(app.clone(), "/api/weather?lat=18.79&lon=98.98&city=Chiang%20Mai", None).await;
    let after: DateTime<Utc> = Utc::now();
    assert_eq!(status, StatusCode::OK);

    let fetched_at: DateTime<Utc> = fetched["fetchedAt"].as_str().unwrap().parse().unwrap();
    assert!(fetched_at >= before && fetched_at <= after);
    assert_eq!(fetched["location"]["city"], "Chiang Mai");

    let (status, latest) = get(app, "/api/latest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["configured"], true);
    assert_eq!(latest["id"], 1);
    assert_eq!(latest["data"], fetched);
}

#[tokio::test]
async fn dashboard_view_trims_current_day() {
    let harness = Harness::new(true).await;
    Mock::given(method("GET"))
        .and(path("/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "city": "Tokyo", "country_name": "Japan", "latitude": 35.68, "longitude": 139.69
        })))
        .mount(&harness.geolocation)
        .await;
    harness.mount_forecast_ok(21.4).await;

    let app = harness.app();
    let (status, view) = get(app.clone(), "/api/view/now", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["now"]["location"], "Tokyo, Japan");
    assert_eq!(view["now"]["temperature"], "21.4°C");
    assert_eq!(view["now"]["humidity"], "64 %");

    let days = view["days"].as_array().unwrap();
    assert_eq!(days.len(), 5);
    assert_eq!(days[0]["date"], "2026-10-13");
    assert_eq!(days[4]["date"], "2026-10-17");
    assert_eq!(view["chart"]["labels"].as_array().unwrap().len(), 5);
    assert_eq!(view["map"]["popup"], "Tokyo");

    let (_, latest) = get(app, "/api/view/latest", None).await;
    assert_eq!(latest["data"], view);
}
