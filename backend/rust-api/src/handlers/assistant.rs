use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    error::AppResult, extractors::AppJson, middlewares::auth::JwtClaims, models::ChatRequest,
    services::AppState,
};

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ChatRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!(
        "Assistant chat: user={}, material={}",
        claims.sub,
        req.material_id.as_deref().unwrap_or("-")
    );

    let response = state.assistant.chat(&claims.sub, req).await?;
    Ok(Json(response))
}
