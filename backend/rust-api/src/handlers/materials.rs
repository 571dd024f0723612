use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middlewares::auth::JwtClaims,
    models::UploadMaterialResponse,
    services::{material_service::build_upload_request, AppState},
};

/// Multipart fields: `file` (required), `title`, `subject`.
pub async fn upload_material(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut title = None;
    let mut subject = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("file field has no file name".to_string()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read file: {}", e)))?;
                file = Some((file_name, bytes.to_vec()));
            }
            "title" | "subject" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read {}: {}", name, e)))?;
                if name == "title" {
                    title = Some(value);
                } else {
                    subject = Some(value);
                }
            }
            _ => {}
        }
    }

    let (file_name, contents) =
        file.ok_or_else(|| AppError::Validation("missing file field".to_string()))?;

    tracing::info!(
        "Upload received: user={}, file={}, bytes={}",
        claims.sub,
        file_name,
        contents.len()
    );

    let request = build_upload_request(&file_name, title, subject);
    let material = state.materials.upload(&claims.sub, request, &contents).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadMaterialResponse {
            material,
            message: "Material uploaded, text extraction started".to_string(),
        }),
    ))
}

pub async fn list_materials(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let materials = state.materials.list(&claims.sub).await?;
    Ok(Json(materials))
}

pub async fn get_material(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(material_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let material = state.materials.get(&claims.sub, &material_id).await?;
    Ok(Json(material))
}
