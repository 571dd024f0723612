use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{error::AppResult, middlewares::auth::JwtClaims, services::AppState};

pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(material_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let progress = state.progress.get_progress(&claims.sub, &material_id).await?;
    Ok(Json(progress))
}
