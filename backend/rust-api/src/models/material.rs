use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// An uploaded learning document and, once extraction finishes, its text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Material {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub subject: String,
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub file_type: String,
    pub status: MaterialStatus,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaterialStatus {
    Uploading,
    Processing,
    Completed,
    Error,
}

impl MaterialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialStatus::Uploading => "uploading",
            MaterialStatus::Processing => "processing",
            MaterialStatus::Completed => "completed",
            MaterialStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MaterialStatus::Completed | MaterialStatus::Error)
    }
}

impl Material {
    /// Text eligible for artifact generation. `None` until extraction has
    /// completed with a non-blank result.
    pub fn ready_text(&self) -> Option<&str> {
        if self.status != MaterialStatus::Completed {
            return None;
        }
        self.extracted_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Status as callers should see it: an extraction that never reported back
    /// within `stale_after` is treated as failed.
    pub fn effective_status(&self, now: DateTime<Utc>, stale_after: Duration) -> MaterialStatus {
        if !self.status.is_terminal() && now - self.created_at > stale_after {
            MaterialStatus::Error
        } else {
            self.status
        }
    }

    pub fn mark_completed(&mut self, text: String) {
        self.word_count = count_words(&text);
        self.extracted_text = Some(text);
        self.status = MaterialStatus::Completed;
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = MaterialStatus::Error;
        self.error_message = Some(reason.into());
        self.updated_at = Utc::now();
    }
}

/// Number of whitespace-delimited tokens.
pub fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Metadata accompanying a multipart upload.
#[derive(Debug, Clone, Validate)]
pub struct UploadMaterialRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
}

/// Listing view; the extracted text is omitted.
#[derive(Debug, Serialize, Deserialize)]
pub struct MaterialListItem {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub status: MaterialStatus,
    pub word_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadMaterialResponse {
    pub material: Material,
    pub message: String,
}
