//! Fetch-cached-or-generate-and-persist, written once for every artifact kind.
//!
//! A material gets at most one artifact of each kind. The first request
//! generates it (provider first, canned content if the provider fails) and
//! persists it; every later request returns the stored artifact unchanged.
//! Two racing first requests may both generate, but the store's per-material
//! uniqueness lets only one insert land and the loser returns the winner.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::config::QuizDefaults;
use crate::error::{AppError, AppResult};
use crate::metrics::record_artifact_request;
use crate::models::{ArtifactSource, Material, Question, Quiz, Summary, SummaryContent};
use crate::services::fallback_content;
use crate::services::generation_gateway::{GatewayError, GenerationGateway};
use crate::store::{Store, StoreError, StoreResult};

/// One kind of derived study artifact.
#[async_trait]
pub trait ArtifactKind: Send + Sync {
    type Artifact: Clone + Send + Sync;
    type Content: Send;

    fn name(&self) -> &'static str;

    async fn find_cached(
        &self,
        store: &dyn Store,
        material_id: &str,
    ) -> StoreResult<Option<Self::Artifact>>;

    async fn generate(
        &self,
        gateway: &GenerationGateway,
        material: &Material,
        text: &str,
    ) -> Result<Self::Content, GatewayError>;

    fn fallback(&self) -> Self::Content;

    fn assemble(&self, material: &Material, content: Self::Content) -> Self::Artifact;

    async fn persist(&self, store: &dyn Store, artifact: &Self::Artifact) -> StoreResult<()>;
}

pub struct SummaryKind;

#[async_trait]
impl ArtifactKind for SummaryKind {
    type Artifact = Summary;
    type Content = SummaryContent;

    fn name(&self) -> &'static str {
        "summary"
    }

    async fn find_cached(&self, store: &dyn Store, material_id: &str) -> StoreResult<Option<Summary>> {
        store.find_summary_by_material(material_id).await
    }

    async fn generate(
        &self,
        gateway: &GenerationGateway,
        _material: &Material,
        text: &str,
    ) -> Result<SummaryContent, GatewayError> {
        gateway.generate_summary(text).await
    }

    fn fallback(&self) -> SummaryContent {
        fallback_content::summary()
    }

    fn assemble(&self, material: &Material, content: SummaryContent) -> Summary {
        let now = Utc::now();
        Summary {
            id: Uuid::new_v4().to_string(),
            material_id: material.id.clone(),
            bullet_points: content.bullet_points,
            paragraphs: content.paragraphs,
            concepts: content.concepts,
            created_at: now,
            updated_at: now,
        }
    }

    async fn persist(&self, store: &dyn Store, artifact: &Summary) -> StoreResult<()> {
        store.insert_summary(artifact).await
    }
}

pub struct QuizKind {
    pub defaults: QuizDefaults,
}

#[async_trait]
impl ArtifactKind for QuizKind {
    type Artifact = Quiz;
    type Content = Vec<Question>;

    fn name(&self) -> &'static str {
        "quiz"
    }

    async fn find_cached(&self, store: &dyn Store, material_id: &str) -> StoreResult<Option<Quiz>> {
        store.find_quiz_by_material(material_id).await
    }

    async fn generate(
        &self,
        gateway: &GenerationGateway,
        material: &Material,
        text: &str,
    ) -> Result<Vec<Question>, GatewayError> {
        gateway.generate_quiz(text, &material.subject).await
    }

    fn fallback(&self) -> Vec<Question> {
        fallback_content::quiz_questions()
    }

    fn assemble(&self, material: &Material, questions: Vec<Question>) -> Quiz {
        let now = Utc::now();
        Quiz {
            id: Uuid::new_v4().to_string(),
            material_id: material.id.clone(),
            title: format!("Quiz: {}", material.title),
            questions,
            time_limit: self.defaults.time_limit_secs,
            passing_score: self.defaults.passing_score,
            created_at: now,
            updated_at: now,
        }
    }

    async fn persist(&self, store: &dyn Store, artifact: &Quiz) -> StoreResult<()> {
        store.insert_quiz(artifact).await
    }
}

/// An artifact together with the material it belongs to and where it came from.
#[derive(Debug, Clone)]
pub struct Generated<A> {
    pub artifact: A,
    pub material: Material,
    pub source: ArtifactSource,
}

pub struct ArtifactService {
    store: Arc<dyn Store>,
    gateway: Arc<GenerationGateway>,
    quiz_defaults: QuizDefaults,
}

impl ArtifactService {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<GenerationGateway>,
        quiz_defaults: QuizDefaults,
    ) -> Self {
        Self {
            store,
            gateway,
            quiz_defaults,
        }
    }

    pub async fn request_summary(&self, user_id: &str, material_id: &str) -> AppResult<Generated<Summary>> {
        self.get_or_create(&SummaryKind, user_id, material_id).await
    }

    pub async fn request_quiz(&self, user_id: &str, material_id: &str) -> AppResult<Generated<Quiz>> {
        let kind = QuizKind {
            defaults: self.quiz_defaults.clone(),
        };
        self.get_or_create(&kind, user_id, material_id).await
    }

    pub async fn get_summary(&self, user_id: &str, material_id: &str) -> AppResult<Generated<Summary>> {
        self.get_existing(&SummaryKind, user_id, material_id).await
    }

    pub async fn get_quiz(&self, user_id: &str, material_id: &str) -> AppResult<Generated<Quiz>> {
        let kind = QuizKind {
            defaults: self.quiz_defaults.clone(),
        };
        self.get_existing(&kind, user_id, material_id).await
    }

    pub async fn get_or_create<K: ArtifactKind>(
        &self,
        kind: &K,
        user_id: &str,
        material_id: &str,
    ) -> AppResult<Generated<K::Artifact>> {
        let material = self.load_owned_material(user_id, material_id).await?;

        if let Some(artifact) = kind.find_cached(self.store.as_ref(), &material.id).await? {
            tracing::debug!("{} found in cache for material={}", kind.name(), material.id);
            record_artifact_request(kind.name(), ArtifactSource::Cache.as_str());
            return Ok(Generated {
                artifact,
                material,
                source: ArtifactSource::Cache,
            });
        }

        let text = material.ready_text().ok_or_else(|| {
            AppError::NotReady(format!(
                "material {} is {}",
                material.id,
                material.status.as_str()
            ))
        })?;

        let (content, source) = match kind.generate(&self.gateway, &material, text).await {
            Ok(content) => (content, ArtifactSource::Provider),
            Err(e) => {
                tracing::warn!(
                    "Generation failed for {} of material={}, using fallback content: {}",
                    kind.name(),
                    material.id,
                    e
                );
                (kind.fallback(), ArtifactSource::Fallback)
            }
        };

        let artifact = kind.assemble(&material, content);

        match kind.persist(self.store.as_ref(), &artifact).await {
            Ok(()) => {
                tracing::info!(
                    "{} created for material={} (source={})",
                    kind.name(),
                    material.id,
                    source.as_str()
                );
                record_artifact_request(kind.name(), source.as_str());
                Ok(Generated {
                    artifact,
                    material,
                    source,
                })
            }
            Err(StoreError::Duplicate) => {
                // Lost the race against a concurrent first request.
                let winner = kind
                    .find_cached(self.store.as_ref(), &material.id)
                    .await?
                    .ok_or(AppError::Persistence(StoreError::Duplicate))?;
                tracing::info!(
                    "{} for material={} was persisted concurrently, returning stored one",
                    kind.name(),
                    material.id
                );
                record_artifact_request(kind.name(), ArtifactSource::Cache.as_str());
                Ok(Generated {
                    artifact: winner,
                    material,
                    source: ArtifactSource::Cache,
                })
            }
            Err(e) => {
                tracing::error!(
                    "Failed to persist {} for material={}: {}",
                    kind.name(),
                    material.id,
                    e
                );
                Err(AppError::Persistence(e))
            }
        }
    }

    async fn get_existing<K: ArtifactKind>(
        &self,
        kind: &K,
        user_id: &str,
        material_id: &str,
    ) -> AppResult<Generated<K::Artifact>> {
        let material = self.load_owned_material(user_id, material_id).await?;
        let artifact = kind
            .find_cached(self.store.as_ref(), &material.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} for material {}", kind.name(), material_id)))?;

        Ok(Generated {
            artifact,
            material,
            source: ArtifactSource::Cache,
        })
    }

    /// Materials owned by someone else are indistinguishable from missing ones.
    pub async fn load_owned_material(&self, user_id: &str, material_id: &str) -> AppResult<Material> {
        match self.store.get_material(material_id).await? {
            Some(material) if material.user_id == user_id => Ok(material),
            _ => Err(AppError::NotFound(format!("material {}", material_id))),
        }
    }
}
