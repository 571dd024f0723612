use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Store, StoreError, StoreResult};
use crate::models::{Material, Quiz, QuizAttempt, Summary, SummaryView};

/// In-process store with the same uniqueness rules as the MongoDB backend.
#[derive(Default)]
pub struct MemoryStore {
    materials: RwLock<HashMap<String, Material>>,
    summaries: RwLock<HashMap<String, Summary>>,
    quizzes: RwLock<HashMap<String, Quiz>>,
    attempts: RwLock<Vec<QuizAttempt>>,
    summary_views: RwLock<HashMap<String, SummaryView>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_material(&self, material: &Material) -> StoreResult<()> {
        let mut materials = self.materials.write().await;
        if materials.contains_key(&material.id) {
            return Err(StoreError::Duplicate);
        }
        materials.insert(material.id.clone(), material.clone());
        Ok(())
    }

    async fn get_material(&self, id: &str) -> StoreResult<Option<Material>> {
        Ok(self.materials.read().await.get(id).cloned())
    }

    async fn list_materials_by_user(&self, user_id: &str) -> StoreResult<Vec<Material>> {
        let mut result: Vec<Material> = self
            .materials
            .read()
            .await
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn replace_material(&self, material: &Material) -> StoreResult<()> {
        let mut materials = self.materials.write().await;
        match materials.get_mut(&material.id) {
            Some(existing) => {
                *existing = material.clone();
                Ok(())
            }
            None => Err(StoreError::Missing),
        }
    }

    async fn find_summary_by_material(&self, material_id: &str) -> StoreResult<Option<Summary>> {
        Ok(self
            .summaries
            .read()
            .await
            .values()
            .find(|s| s.material_id == material_id)
            .cloned())
    }

    async fn insert_summary(&self, summary: &Summary) -> StoreResult<()> {
        let mut summaries = self.summaries.write().await;
        if summaries
            .values()
            .any(|s| s.id == summary.id || s.material_id == summary.material_id)
        {
            return Err(StoreError::Duplicate);
        }
        summaries.insert(summary.id.clone(), summary.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: &str) -> StoreResult<Option<Quiz>> {
        Ok(self.quizzes.read().await.get(id).cloned())
    }

    async fn find_quiz_by_material(&self, material_id: &str) -> StoreResult<Option<Quiz>> {
        Ok(self
            .quizzes
            .read()
            .await
            .values()
            .find(|q| q.material_id == material_id)
            .cloned())
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> StoreResult<()> {
        let mut quizzes = self.quizzes.write().await;
        if quizzes
            .values()
            .any(|q| q.id == quiz.id || q.material_id == quiz.material_id)
        {
            return Err(StoreError::Duplicate);
        }
        quizzes.insert(quiz.id.clone(), quiz.clone());
        Ok(())
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        let mut attempts = self.attempts.write().await;
        if attempts.iter().any(|a| a.id == attempt.id) {
            return Err(StoreError::Duplicate);
        }
        attempts.push(attempt.clone());
        Ok(())
    }

    async fn list_attempts(&self, user_id: &str, quiz_id: &str) -> StoreResult<Vec<QuizAttempt>> {
        Ok(self
            .attempts
            .read()
            .await
            .iter()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn record_summary_view(
        &self,
        user_id: &str,
        material_id: &str,
        viewed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let key = SummaryView::key(user_id, material_id);
        self.summary_views
            .write()
            .await
            .entry(key.clone())
            .and_modify(|view| view.last_viewed_at = viewed_at)
            .or_insert_with(|| SummaryView {
                id: key,
                user_id: user_id.to_string(),
                material_id: material_id.to_string(),
                first_viewed_at: viewed_at,
                last_viewed_at: viewed_at,
            });
        Ok(())
    }

    async fn find_summary_view(
        &self,
        user_id: &str,
        material_id: &str,
    ) -> StoreResult<Option<SummaryView>> {
        Ok(self
            .summary_views
            .read()
            .await
            .get(&SummaryView::key(user_id, material_id))
            .cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
