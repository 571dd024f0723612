use std::sync::Arc;

use tracing::{debug, warn};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::metrics::record_artifact_request;
use crate::models::{ArtifactSource, ChatRequest, ChatResponse};
use crate::services::fallback_content;
use crate::services::generation_gateway::GenerationGateway;
use crate::store::Store;

/// Free-form study questions answered by the generation provider.
pub struct AssistantService {
    store: Arc<dyn Store>,
    gateway: Arc<GenerationGateway>,
}

impl AssistantService {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<GenerationGateway>) -> Self {
        Self { store, gateway }
    }

    /// Never fails on the provider: any gateway error yields a canned reply
    /// marked as degraded.
    pub async fn chat(&self, user_id: &str, request: ChatRequest) -> AppResult<ChatResponse> {
        request.validate()?;
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("message must not be blank".to_string()));
        }

        let context = self
            .material_context(user_id, request.material_id.as_deref())
            .await;

        let (response, source) = match self.gateway.chat(message, &context).await {
            Ok(reply) => (reply, ArtifactSource::Provider),
            Err(e) => {
                warn!(user = %user_id, error = %e, "Assistant provider call failed, using canned reply");
                (
                    fallback_content::assistant_reply(message).to_string(),
                    ArtifactSource::Fallback,
                )
            }
        };
        record_artifact_request("assistant", source.as_str());

        Ok(ChatResponse {
            response,
            source,
            degraded: source.is_degraded(),
        })
    }

    /// Extracted text of the caller's own material, or empty for a missing,
    /// foreign or unprocessed one.
    async fn material_context(&self, user_id: &str, material_id: Option<&str>) -> String {
        let Some(material_id) = material_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return String::new();
        };

        match self.store.get_material(material_id).await {
            Ok(Some(material)) if material.user_id == user_id => {
                material.extracted_text.unwrap_or_default()
            }
            Ok(_) => {
                debug!(user = %user_id, material = %material_id, "No usable material for assistant context");
                String::new()
            }
            Err(e) => {
                warn!(material = %material_id, error = %e, "Failed to load assistant context");
                String::new()
            }
        }
    }
}
