//! Durable storage seam. Every record is keyed by its own id; artifacts are
//! additionally unique per material, which is what keeps at most one summary
//! and one quiz per material even when two first requests race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Material, Quiz, QuizAttempt, Summary, SummaryView};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same unique key already exists.
    #[error("Duplicate record")]
    Duplicate,

    #[error("Record not found")]
    Missing,

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_material(&self, material: &Material) -> StoreResult<()>;
    async fn get_material(&self, id: &str) -> StoreResult<Option<Material>>;
    async fn list_materials_by_user(&self, user_id: &str) -> StoreResult<Vec<Material>>;
    /// Whole-record replacement; fails with `Missing` if the material is gone.
    async fn replace_material(&self, material: &Material) -> StoreResult<()>;

    async fn find_summary_by_material(&self, material_id: &str) -> StoreResult<Option<Summary>>;
    /// Fails with `Duplicate` if the material already has a summary.
    async fn insert_summary(&self, summary: &Summary) -> StoreResult<()>;

    async fn get_quiz(&self, id: &str) -> StoreResult<Option<Quiz>>;
    async fn find_quiz_by_material(&self, material_id: &str) -> StoreResult<Option<Quiz>>;
    /// Fails with `Duplicate` if the material already has a quiz.
    async fn insert_quiz(&self, quiz: &Quiz) -> StoreResult<()>;

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()>;
    async fn list_attempts(&self, user_id: &str, quiz_id: &str) -> StoreResult<Vec<QuizAttempt>>;

    /// Creates the view on first sight and only bumps `last_viewed_at`
    /// afterwards, as one atomic write.
    async fn record_summary_view(
        &self,
        user_id: &str,
        material_id: &str,
        viewed_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn find_summary_view(&self, user_id: &str, material_id: &str)
        -> StoreResult<Option<SummaryView>>;

    async fn ping(&self) -> StoreResult<()>;
}
