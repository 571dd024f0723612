use std::sync::Arc;

use mongodb::Client as MongoClient;

use crate::config::Config;
use crate::store::{MemoryStore, MongoStore, Store};

use artifact_service::ArtifactService;
use assistant_service::AssistantService;
use generation_gateway::{CompletionClient, GenerationGateway, OpenRouterClient};
use grading_service::GradingService;
use material_service::{spawn_extraction_workers, ExtractionQueue, MaterialService};
use progress_service::ProgressService;
use text_extractor::{DocumentTextExtractor, TextExtractor};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub artifacts: ArtifactService,
    pub assistant: AssistantService,
    pub materials: MaterialService,
    pub grading: GradingService,
    pub progress: ProgressService,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let db = mongo_client.database(&config.mongo_database);

        tracing::info!("Ensuring MongoDB indexes...");
        let store = tokio::time::timeout(std::time::Duration::from_secs(30), MongoStore::new(db))
            .await
            .map_err(|_| anyhow::anyhow!("MongoDB index setup timeout after 30s"))??;
        tracing::info!("MongoDB store ready");

        let client = provider_client(&config)?;
        Ok(Self::with_components(
            config,
            Arc::new(store),
            client,
            Arc::new(DocumentTextExtractor),
        ))
    }

    /// Same wiring over a process-local store. Nothing survives a restart.
    pub fn in_memory(config: Config) -> anyhow::Result<Self> {
        tracing::warn!("Using the in-memory store, data is lost on shutdown");

        let client = provider_client(&config)?;
        Ok(Self::with_components(
            config,
            Arc::new(MemoryStore::new()),
            client,
            Arc::new(DocumentTextExtractor),
        ))
    }

    /// Wires the services over the given collaborators and starts the
    /// extraction workers. Must be called inside a Tokio runtime.
    pub fn with_components(
        config: Config,
        store: Arc<dyn Store>,
        client: Arc<dyn CompletionClient>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        let gateway = Arc::new(GenerationGateway::new(client, config.generation.model.clone()));

        let (queue, receiver) = ExtractionQueue::new(config.extraction.queue_capacity);
        spawn_extraction_workers(config.extraction.workers, receiver, store.clone(), extractor);

        Self {
            artifacts: ArtifactService::new(store.clone(), gateway.clone(), config.quiz.clone()),
            assistant: AssistantService::new(store.clone(), gateway),
            materials: MaterialService::new(
                store.clone(),
                queue,
                config.upload_dir.clone(),
                config.max_upload_bytes,
                config.extraction.stale_after_secs,
            ),
            grading: GradingService::new(store.clone()),
            progress: ProgressService::new(store.clone()),
            store,
            config,
        }
    }
}

fn provider_client(config: &Config) -> anyhow::Result<Arc<dyn CompletionClient>> {
    let client = OpenRouterClient::new(&config.generation)?;
    if config.generation.api_key.is_none() {
        tracing::warn!("Generation provider not configured, artifacts will use fallback content");
    }
    Ok(Arc::new(client))
}

pub mod artifact_service;
pub mod assistant_service;
pub mod fallback_content;
pub mod generation_gateway;
pub mod grading_service;
pub mod material_service;
pub mod progress_service;
pub mod text_extractor;
