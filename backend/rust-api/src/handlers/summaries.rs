use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middlewares::auth::JwtClaims,
    models::{MaterialRef, Summary, SummaryResponse},
    services::{artifact_service::Generated, AppState},
};

fn into_response(generated: Generated<Summary>) -> SummaryResponse {
    SummaryResponse {
        material: MaterialRef::from(&generated.material),
        summary: generated.artifact,
        source: generated.source,
        degraded: generated.source.is_degraded(),
    }
}

async fn record_view(state: &AppState, user_id: &str, material_id: &str) {
    if let Err(e) = state.progress.record_summary_view(user_id, material_id).await {
        tracing::warn!("Failed to record summary view for material={}: {}", material_id, e);
    }
}

pub async fn generate_summary(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(material_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("Summary requested: user={}, material={}", claims.sub, material_id);

    let generated = state.artifacts.request_summary(&claims.sub, &material_id).await?;
    record_view(&state, &claims.sub, &material_id).await;

    let status = if generated.source.is_fresh() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(into_response(generated))))
}

pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(material_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let generated = state.artifacts.get_summary(&claims.sub, &material_id).await?;
    record_view(&state, &claims.sub, &material_id).await;

    Ok(Json(into_response(generated)))
}
