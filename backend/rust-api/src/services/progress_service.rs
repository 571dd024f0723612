use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::models::{Progress, QuizAttempt};
use crate::store::Store;

/// Folds a user's attempts against one quiz into progress counters.
pub fn fold_progress(
    user_id: &str,
    material_id: &str,
    viewed_summary: bool,
    attempts: &[QuizAttempt],
) -> Progress {
    Progress {
        user_id: user_id.to_string(),
        material_id: material_id.to_string(),
        has_viewed_summary: viewed_summary,
        has_taken_quiz: !attempts.is_empty(),
        best_score: attempts.iter().map(|a| a.score).max().unwrap_or(0),
        total_attempts: attempts.len() as u32,
        last_attempt_at: attempts.iter().map(|a| a.created_at).max(),
    }
}

pub struct ProgressService {
    store: Arc<dyn Store>,
}

impl ProgressService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record_summary_view(&self, user_id: &str, material_id: &str) -> AppResult<()> {
        self.store
            .record_summary_view(user_id, material_id, Utc::now())
            .await?;
        Ok(())
    }

    pub async fn get_progress(&self, user_id: &str, material_id: &str) -> AppResult<Progress> {
        match self.store.get_material(material_id).await? {
            Some(material) if material.user_id == user_id => {}
            _ => return Err(AppError::NotFound(format!("material {}", material_id))),
        }

        let viewed = self
            .store
            .find_summary_view(user_id, material_id)
            .await?
            .is_some();

        let attempts = match self.store.find_quiz_by_material(material_id).await? {
            Some(quiz) => self.store.list_attempts(user_id, &quiz.id).await?,
            None => Vec::new(),
        };

        Ok(fold_progress(user_id, material_id, viewed, &attempts))
    }
}
