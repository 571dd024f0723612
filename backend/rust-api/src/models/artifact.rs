use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::material::Material;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    #[serde(rename = "_id")]
    pub id: String,
    pub material_id: String,
    pub bullet_points: String,
    pub paragraphs: String,
    pub concepts: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The three labelled sections of a summary before it is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryContent {
    pub bullet_points: String,
    pub paragraphs: String,
    pub concepts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: String,
    pub material_id: String,
    pub title: String,
    pub questions: Vec<Question>,
    pub time_limit: u32,
    pub passing_score: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
}

impl Question {
    /// A multiple-choice question must list its correct answer among the options.
    pub fn is_consistent(&self) -> bool {
        match self.question_type {
            QuestionType::MultipleChoice => self
                .options
                .as_ref()
                .is_some_and(|options| options.iter().any(|o| o == &self.correct_answer)),
            QuestionType::TrueFalse => true,
        }
    }
}

/// Where a returned artifact came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSource {
    Cache,
    Provider,
    Fallback,
}

impl ArtifactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactSource::Cache => "cache",
            ArtifactSource::Provider => "provider",
            ArtifactSource::Fallback => "fallback",
        }
    }

    /// Fallback content stands in for a failed provider call.
    pub fn is_degraded(&self) -> bool {
        matches!(self, ArtifactSource::Fallback)
    }

    pub fn is_fresh(&self) -> bool {
        !matches!(self, ArtifactSource::Cache)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaterialRef {
    pub id: String,
    pub title: String,
    pub subject: String,
}

impl From<&Material> for MaterialRef {
    fn from(material: &Material) -> Self {
        Self {
            id: material.id.clone(),
            title: material.title.clone(),
            subject: material.subject.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: Summary,
    pub material: MaterialRef,
    pub source: ArtifactSource,
    pub degraded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizResponse {
    pub quiz: Quiz,
    pub material: MaterialRef,
    pub source: ArtifactSource,
    pub degraded: bool,
}
