use serde::{Deserialize, Serialize};
use validator::Validate;

use super::artifact::ArtifactSource;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
    /// Material whose extracted text grounds the answer. Ignored unless the
    /// caller owns it.
    #[serde(default)]
    pub material_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub source: ArtifactSource,
    pub degraded: bool,
}
