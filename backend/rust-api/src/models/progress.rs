use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker that a user has been shown the summary of a material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryView {
    /// `{user_id}:{material_id}`
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub material_id: String,
    pub first_viewed_at: DateTime<Utc>,
    pub last_viewed_at: DateTime<Utc>,
}

impl SummaryView {
    pub fn key(user_id: &str, material_id: &str) -> String {
        format!("{}:{}", user_id, material_id)
    }
}

/// Per (user, material) learning progress, derived from views and attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub user_id: String,
    pub material_id: String,
    pub has_viewed_summary: bool,
    pub has_taken_quiz: bool,
    pub best_score: u32,
    pub total_attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}
