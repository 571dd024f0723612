use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub answers: HashMap<String, String>,
    pub score: u32,
    pub time_spent: u32,
    pub passed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    /// Question id (decimal) -> submitted answer.
    pub answers: HashMap<String, String>,
    /// Seconds spent on the attempt.
    #[validate(range(max = 86400))]
    #[serde(default)]
    pub time_spent: u32,
}

/// Result of scoring one answer set against a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub score: u32,
    pub correct: u32,
    pub total: u32,
    pub passed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQuizResponse {
    pub score: u32,
    pub correct: u32,
    pub total: u32,
    pub passed: bool,
    pub passing_score: u32,
    pub attempt_id: String,
}
