use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::AppState;

pub mod assistant;
pub mod materials;
pub mod progress;
pub mod quizzes;
pub mod summaries;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();

    let store_healthy = match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        state.store.ping(),
    )
    .await
    {
        Ok(Ok(())) => {
            dependencies.insert("store".to_string(), json!({ "status": "healthy" }));
            true
        }
        Ok(Err(e)) => {
            dependencies.insert(
                "store".to_string(),
                json!({ "status": "unhealthy", "error": e.to_string() }),
            );
            false
        }
        Err(_) => {
            dependencies.insert(
                "store".to_string(),
                json!({ "status": "unhealthy", "error": "store timeout after 1s" }),
            );
            false
        }
    };

    // An unconfigured provider only degrades artifacts, it never fails requests.
    let provider = if state.config.generation.api_key.is_some() {
        "configured"
    } else {
        "fallback_only"
    };
    dependencies.insert("generation".to_string(), json!({ "status": provider }));

    let (status_code, status) = if store_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "studyforge-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// HTTP Basic auth for `/metrics`, credentials `user:password` from config.
pub async fn metrics_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if credentials != state.config.metrics_auth {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
