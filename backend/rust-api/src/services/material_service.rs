use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::metrics::EXTRACTION_JOBS_TOTAL;
use crate::models::{Material, MaterialListItem, MaterialStatus, UploadMaterialRequest};
use crate::services::text_extractor::{TextExtractor, SUPPORTED_FILE_TYPES};
use crate::store::Store;

/// Only file types the extractor can read are accepted.
pub const ALLOWED_EXTENSIONS: &[&str] = SUPPORTED_FILE_TYPES;

const DEFAULT_SUBJECT: &str = "General";

/// Work item handed to the extraction pool after an upload is persisted.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub material_id: String,
    pub path: PathBuf,
    pub file_type: String,
}

#[derive(Clone)]
pub struct ExtractionQueue {
    sender: mpsc::Sender<ExtractionJob>,
}

impl ExtractionQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ExtractionJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Waits for queue capacity, not for the extraction itself.
    pub async fn submit(&self, job: ExtractionJob) -> AppResult<()> {
        self.sender
            .send(job)
            .await
            .map_err(|_| AppError::Internal("extraction queue is closed".to_string()))
    }
}

/// Starts `workers` tasks that drain the queue until every sender is dropped.
pub fn spawn_extraction_workers(
    workers: usize,
    receiver: mpsc::Receiver<ExtractionJob>,
    store: Arc<dyn Store>,
    extractor: Arc<dyn TextExtractor>,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    info!("Starting {} extraction workers", workers);

    (0..workers.max(1))
        .map(|worker| {
            let receiver = receiver.clone();
            let store = store.clone();
            let extractor = extractor.clone();
            tokio::spawn(async move {
                loop {
                    let job = { receiver.lock().await.recv().await };
                    let Some(job) = job else {
                        info!(worker, "Extraction queue closed, worker exiting");
                        break;
                    };
                    process_extraction_job(store.as_ref(), extractor.as_ref(), job).await;
                }
            })
        })
        .collect()
}

/// Runs one extraction and writes the terminal state back in a single
/// whole-record replace.
pub async fn process_extraction_job(
    store: &dyn Store,
    extractor: &dyn TextExtractor,
    job: ExtractionJob,
) {
    let mut material = match store.get_material(&job.material_id).await {
        Ok(Some(material)) => material,
        Ok(None) => {
            warn!(material = %job.material_id, "Material vanished before extraction");
            EXTRACTION_JOBS_TOTAL.with_label_values(&["missing"]).inc();
            return;
        }
        Err(e) => {
            error!(material = %job.material_id, error = %e, "Failed to load material for extraction");
            EXTRACTION_JOBS_TOTAL.with_label_values(&["store_error"]).inc();
            return;
        }
    };

    let outcome = match extractor.extract(&job.path, &job.file_type).await {
        Ok(text) => {
            material.mark_completed(text);
            "completed"
        }
        Err(e) => {
            warn!(material = %job.material_id, error = %e, "Text extraction failed");
            material.mark_failed(e.to_string());
            e.outcome()
        }
    };

    match store.replace_material(&material).await {
        Ok(()) => {
            info!(
                material = %material.id,
                status = material.status.as_str(),
                words = material.word_count,
                "Extraction finished"
            );
            EXTRACTION_JOBS_TOTAL.with_label_values(&[outcome]).inc();
        }
        Err(e) => {
            error!(material = %material.id, error = %e, "Failed to record extraction result");
            EXTRACTION_JOBS_TOTAL.with_label_values(&["store_error"]).inc();
        }
    }
}

/// Fills in the optional multipart fields: title defaults to the file stem,
/// subject to "General".
pub fn build_upload_request(
    file_name: &str,
    title: Option<String>,
    subject: Option<String>,
) -> UploadMaterialRequest {
    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            Path::new(file_name)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.to_string())
        });
    let subject = subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

    UploadMaterialRequest {
        title,
        subject,
        file_name: file_name.to_string(),
    }
}

/// Lower-cased extension with its leading dot, if it is one we accept.
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    let ext = format!(".{}", ext);
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn list_item(material: Material, status: MaterialStatus) -> MaterialListItem {
    MaterialListItem {
        id: material.id,
        title: material.title,
        subject: material.subject,
        file_name: material.file_name,
        file_size: material.file_size,
        file_type: material.file_type,
        status,
        word_count: material.word_count,
        created_at: material.created_at,
        updated_at: material.updated_at,
    }
}

pub struct MaterialService {
    store: Arc<dyn Store>,
    queue: ExtractionQueue,
    upload_dir: PathBuf,
    max_upload_bytes: u64,
    stale_after: Duration,
}

impl MaterialService {
    pub fn new(
        store: Arc<dyn Store>,
        queue: ExtractionQueue,
        upload_dir: impl Into<PathBuf>,
        max_upload_bytes: u64,
        stale_after_secs: i64,
    ) -> Self {
        Self {
            store,
            queue,
            upload_dir: upload_dir.into(),
            max_upload_bytes,
            stale_after: Duration::seconds(stale_after_secs),
        }
    }

    /// Stores the file, records the material as `uploading` and schedules
    /// extraction. Returns as soon as the job is queued.
    pub async fn upload(
        &self,
        user_id: &str,
        request: UploadMaterialRequest,
        contents: &[u8],
    ) -> AppResult<Material> {
        request.validate()?;

        let file_type = allowed_extension(&request.file_name).ok_or_else(|| {
            AppError::Validation(format!(
                "unsupported file type, allowed: {}",
                ALLOWED_EXTENSIONS.join(" ")
            ))
        })?;

        if contents.is_empty() {
            return Err(AppError::Validation("uploaded file is empty".to_string()));
        }
        let file_size = contents.len() as u64;
        if file_size > self.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "file exceeds the {} byte limit",
                self.max_upload_bytes
            )));
        }

        // Only the final path component is trusted from the client.
        let safe_name = Path::new(&request.file_name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::Validation("invalid file name".to_string()))?;

        let id = Uuid::new_v4().to_string();
        let path = self.upload_dir.join(format!("{}_{}", id, safe_name));

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| AppError::Internal(format!("cannot create upload directory: {}", e)))?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| AppError::Internal(format!("cannot store uploaded file: {}", e)))?;

        let now = Utc::now();
        let material = Material {
            id,
            user_id: user_id.to_string(),
            title: request.title,
            subject: request.subject,
            file_name: safe_name,
            file_url: path.to_string_lossy().into_owned(),
            file_size,
            file_type,
            status: MaterialStatus::Uploading,
            extracted_text: None,
            word_count: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.insert_material(&material).await {
            error!(material = %material.id, error = %e, "Failed to persist material, removing file");
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %remove_err, "Failed to remove orphaned upload");
            }
            return Err(AppError::Persistence(e));
        }

        info!(material = %material.id, user = %user_id, "Material uploaded");
        self.on_upload_complete(&material).await?;

        Ok(material)
    }

    /// Hands a freshly persisted material to the extraction pool. If the
    /// pool is gone the material is moved to `error` right away.
    pub async fn on_upload_complete(&self, material: &Material) -> AppResult<()> {
        let job = ExtractionJob {
            material_id: material.id.clone(),
            path: PathBuf::from(&material.file_url),
            file_type: material.file_type.clone(),
        };

        if let Err(e) = self.queue.submit(job).await {
            error!(material = %material.id, "Could not schedule extraction");
            let mut failed = material.clone();
            failed.mark_failed("extraction could not be scheduled");
            self.store.replace_material(&failed).await?;
            return Err(e);
        }

        Ok(())
    }

    pub async fn list(&self, user_id: &str) -> AppResult<Vec<MaterialListItem>> {
        let now = Utc::now();
        let materials = self.store.list_materials_by_user(user_id).await?;

        Ok(materials
            .into_iter()
            .map(|material| {
                let status = material.effective_status(now, self.stale_after);
                list_item(material, status)
            })
            .collect())
    }

    pub async fn get(&self, user_id: &str, material_id: &str) -> AppResult<Material> {
        let mut material = match self.store.get_material(material_id).await? {
            Some(material) if material.user_id == user_id => material,
            _ => return Err(AppError::NotFound(format!("material {}", material_id))),
        };

        let effective = material.effective_status(Utc::now(), self.stale_after);
        if effective != material.status {
            material.status = effective;
            material.error_message = Some("text extraction did not finish in time".to_string());
        }

        Ok(material)
    }
}
