use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{MaterialRef, Quiz, QuizResponse, SubmitQuizRequest},
    services::{artifact_service::Generated, AppState},
};

fn into_response(generated: Generated<Quiz>) -> QuizResponse {
    QuizResponse {
        material: MaterialRef::from(&generated.material),
        quiz: generated.artifact,
        source: generated.source,
        degraded: generated.source.is_degraded(),
    }
}

pub async fn generate_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(material_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("Quiz requested: user={}, material={}", claims.sub, material_id);

    let generated = state.artifacts.request_quiz(&claims.sub, &material_id).await?;
    let status = if generated.source.is_fresh() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(into_response(generated))))
}

pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(material_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let generated = state.artifacts.get_quiz(&claims.sub, &material_id).await?;
    Ok(Json(into_response(generated)))
}

pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<SubmitQuizRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("Quiz submitted: user={}, quiz={}", claims.sub, quiz_id);

    let response = state
        .grading
        .submit_quiz_answers(&claims.sub, &quiz_id, req)
        .await?;

    Ok(Json(response))
}
