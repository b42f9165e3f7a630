//! HTTP liveness endpoints for the hosting platform.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tradeai_core::{SERVICE_NAME, SERVICE_VERSION};

use crate::status::BotStatus;

pub fn router(status: Arc<BotStatus>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(status)
}

async fn root() -> &'static str {
    "TradeAI Telegram Bot is running!"
}

async fn health(State(status): State<Arc<BotStatus>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": status.uptime_secs(),
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
    }))
}

async fn ready(State(status): State<Arc<BotStatus>>) -> impl IntoResponse {
    if status.is_ready() {
        (StatusCode::OK, Json(json!({ "status": "ready", "service": SERVICE_NAME })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "starting", "service": SERVICE_NAME })),
        )
    }
}

async fn metrics(State(status): State<Arc<BotStatus>>) -> impl IntoResponse {
    let monitor = status.monitor_stats().await.map(|s| s.to_json());

    Json(json!({
        "status": if status.is_ready() { "running" } else { "starting" },
        "uptime_seconds": status.uptime_secs(),
        "version": SERVICE_VERSION,
        "alert_monitor": monitor,
    }))
}

/// Serve on `0.0.0.0:port` until `shutdown` flips to `true`.
pub async fn serve(port: u16, status: Arc<BotStatus>, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Health server listening");

    axum::serve(listener, router(status))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;

    tracing::info!("Health server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_monitor::MonitorStats;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_root_banner() {
        let app = router(Arc::new(BotStatus::new(None)));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"TradeAI Telegram Bot is running!");
    }

    #[tokio::test]
    async fn test_health_shape() {
        let (status, body) = get_json(router(Arc::new(BotStatus::new(None))), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "TradeAI Telegram Bot");
        assert_eq!(body["version"], "1.0.0");
        assert!(body["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn test_ready_transitions() {
        let status = Arc::new(BotStatus::new(None));

        let (code, body) = get_json(router(status.clone()), "/ready").await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "starting");

        status.set_ready();
        let (code, body) = get_json(router(status), "/ready").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn test_metrics_includes_monitor() {
        let stats = Arc::new(RwLock::new(MonitorStats::default()));
        stats.write().await.record_failure();
        let status = Arc::new(BotStatus::new(Some(stats)));

        let (code, body) = get_json(router(status), "/metrics").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["alert_monitor"]["cycles_failed"], 1);
        assert_eq!(body["status"], "starting");
    }
}
