use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::{self, AppState};
use crate::config::RelayConfig;

/// API under `/api`, everything else from the static directory
pub fn app(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api::router(state))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run(config: &RelayConfig, state: AppState) -> Result<()> {
    let app = app(state, &config.server.static_dir);
    let server = &config.server;

    match (&server.tls_cert, &server.tls_key) {
        (Some(cert), Some(key)) => serve_tls(app, &server.host, server.port, cert, key).await,
        _ => {
            let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port))
                .await
                .with_context(|| format!("Failed to bind {}:{}", server.host, server.port))?;
            tracing::info!("Web server running at http://localhost:{}", server.port);
            tracing::info!("   By IP   -> http://localhost:{}/api/weather/by-ip", server.port);

            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Web server failed")
        }
    }
}

#[cfg(feature = "tls")]
async fn serve_tls(app: Router, host: &str, port: u16, cert: &str, key: &str) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::time::Duration;

    let addr = tokio::net::lookup_host((host, port))
        .await?
        .next()
        .with_context(|| format!("No address for {host}:{port}"))?;
    let tls = RustlsConfig::from_pem_file(cert, key)
        .await
        .with_context(|| format!("Failed to load TLS certificate {cert}"))?;

    let handle = axum_server::Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    tracing::info!("Web server running at https://localhost:{}", port);
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Web server failed")
}

#[cfg(not(feature = "tls"))]
async fn serve_tls(_app: Router, _host: &str, _port: u16, _cert: &str, _key: &str) -> Result<()> {
    anyhow::bail!("TLS is configured but this build was compiled without the `tls` feature")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::from_config(&RelayConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_static_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>weather</h1>").unwrap();

        let app = app(state(), dir.path().to_str().unwrap());
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"<h1>weather</h1>");
    }

    #[tokio::test]
    async fn test_api_is_nested_and_cors_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(state(), dir.path().to_str().unwrap());
        let response = app
            .oneshot(
                Request::get("/api/health")
                    .header("origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_unknown_static_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(state(), dir.path().to_str().unwrap());
        let response = app
            .oneshot(Request::get("/missing.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
