use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// File types [`DocumentTextExtractor`] can turn into text.
pub const SUPPORTED_FILE_TYPES: &[&str] = &[".pdf", ".txt", ".md"];

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to read uploaded file: {0}")]
    Io(#[from] std::io::Error),

    #[error("No text extractor for file type {0}")]
    UnsupportedFileType(String),

    #[error("Unreadable PDF: {0}")]
    Pdf(String),

    #[error("Extracted text is empty")]
    Empty,
}

impl ExtractionError {
    pub fn outcome(&self) -> &'static str {
        match self {
            ExtractionError::Io(_) => "io_error",
            ExtractionError::UnsupportedFileType(_) => "unsupported",
            ExtractionError::Pdf(_) => "pdf_error",
            ExtractionError::Empty => "empty",
        }
    }
}

/// Turns a stored upload into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path, file_type: &str) -> Result<String, ExtractionError>;
}

/// Reads text and markdown files as UTF-8 and pulls the text layer out of
/// PDFs. Scanned PDFs without a text layer come out empty.
#[derive(Debug, Default, Clone)]
pub struct DocumentTextExtractor;

#[async_trait]
impl TextExtractor for DocumentTextExtractor {
    async fn extract(&self, path: &Path, file_type: &str) -> Result<String, ExtractionError> {
        let text = match file_type.to_ascii_lowercase().as_str() {
            ".txt" | ".md" => {
                let bytes = tokio::fs::read(path).await?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            ".pdf" => {
                let bytes = tokio::fs::read(path).await?;
                tokio::task::spawn_blocking(move || pdf_text(&bytes))
                    .await
                    .map_err(|e| ExtractionError::Pdf(e.to_string()))??
            }
            other => return Err(ExtractionError::UnsupportedFileType(other.to_string())),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractionError::Empty);
        }
        Ok(text.to_string())
    }
}

fn pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    document
        .extract_text(&pages)
        .map_err(|e| ExtractionError::Pdf(e.to_string()))
}
