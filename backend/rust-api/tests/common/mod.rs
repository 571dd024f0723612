#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::{json, Value};
use studyforge_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::{Material, MaterialStatus, Quiz, QuizAttempt, Summary, SummaryView},
    services::{
        generation_gateway::{ChatMessage, CompletionClient, GatewayError},
        text_extractor::DocumentTextExtractor,
        AppState,
    },
    store::{MemoryStore, Store, StoreError, StoreResult},
};
use tower::ServiceExt;
use uuid::Uuid;

pub const SUMMARY_REPLY: &str = "BULLET_POINTS:
• Cells are the basic unit of life
• Membranes control what enters the cell

PARAGRAPHS:
Every living organism is made of cells.

CONCEPTS:
Cell membrane: the boundary of the cell
";

/// Completion client that answers from a script instead of the network.
/// `None` for a kind means the provider is unreachable for that kind.
pub struct ScriptedClient {
    summary_reply: Mutex<Option<String>>,
    quiz_reply: Mutex<Option<String>>,
    assistant_reply: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(summary_reply: Option<&str>, quiz_reply: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            summary_reply: Mutex::new(summary_reply.map(str::to_string)),
            quiz_reply: Mutex::new(quiz_reply.map(str::to_string)),
            assistant_reply: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Self::new(None, None)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_quiz_reply(&self, reply: Option<&str>) {
        *self.quiz_reply.lock().unwrap() = reply.map(str::to_string);
    }

    pub fn set_assistant_reply(&self, reply: Option<&str>) {
        *self.assistant_reply.lock().unwrap() = reply.map(str::to_string);
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        _model: &str,
        messages: &[ChatMessage],
    ) -> Result<Vec<String>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages.first().map(|m| m.content.as_str()).unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = if prompt.starts_with("Summarize") {
            self.summary_reply.lock().unwrap().clone()
        } else if prompt.starts_with("You are") {
            self.assistant_reply.lock().unwrap().clone()
        } else {
            self.quiz_reply.lock().unwrap().clone()
        };
        reply
            .map(|r| vec![r])
            .ok_or_else(|| GatewayError::Unreachable("connection refused".to_string()))
    }
}

/// Store whose artifact and attempt writes always fail.
pub struct FailingWritesStore {
    inner: MemoryStore,
}

impl FailingWritesStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
        }
    }

    /// Direct access for seeding records the wrapper would refuse.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn down() -> StoreError {
        StoreError::Backend("write concern timeout".to_string())
    }
}

#[async_trait]
impl Store for FailingWritesStore {
    async fn insert_material(&self, material: &Material) -> StoreResult<()> {
        self.inner.insert_material(material).await
    }
    async fn get_material(&self, id: &str) -> StoreResult<Option<Material>> {
        self.inner.get_material(id).await
    }
    async fn list_materials_by_user(&self, user_id: &str) -> StoreResult<Vec<Material>> {
        self.inner.list_materials_by_user(user_id).await
    }
    async fn replace_material(&self, material: &Material) -> StoreResult<()> {
        self.inner.replace_material(material).await
    }
    async fn find_summary_by_material(&self, material_id: &str) -> StoreResult<Option<Summary>> {
        self.inner.find_summary_by_material(material_id).await
    }
    async fn insert_summary(&self, _summary: &Summary) -> StoreResult<()> {
        Err(Self::down())
    }
    async fn get_quiz(&self, id: &str) -> StoreResult<Option<Quiz>> {
        self.inner.get_quiz(id).await
    }
    async fn find_quiz_by_material(&self, material_id: &str) -> StoreResult<Option<Quiz>> {
        self.inner.find_quiz_by_material(material_id).await
    }
    async fn insert_quiz(&self, _quiz: &Quiz) -> StoreResult<()> {
        Err(Self::down())
    }
    async fn insert_attempt(&self, _attempt: &QuizAttempt) -> StoreResult<()> {
        Err(Self::down())
    }
    async fn list_attempts(&self, user_id: &str, quiz_id: &str) -> StoreResult<Vec<QuizAttempt>> {
        self.inner.list_attempts(user_id, quiz_id).await
    }
    async fn record_summary_view(
        &self,
        user_id: &str,
        material_id: &str,
        viewed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.inner
            .record_summary_view(user_id, material_id, viewed_at)
            .await
    }
    async fn find_summary_view(
        &self,
        user_id: &str,
        material_id: &str,
    ) -> StoreResult<Option<SummaryView>> {
        self.inner.find_summary_view(user_id, material_id).await
    }
    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn Store>,
    pub client: Arc<ScriptedClient>,
    pub config: Config,
}

impl TestApp {
    pub fn token(&self, user_id: &str) -> String {
        JwtService::new(&self.config.jwt_secret)
            .generate_token(&JwtClaims::for_user(user_id, "student", 3600))
            .unwrap()
    }

    /// Sends a request and returns the status with the body parsed as JSON
    /// (`Value::Null` for an empty or non-JSON body).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, user_id: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {}", self.token(user_id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, uri: &str, user_id: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("authorization", format!("Bearer {}", self.token(user_id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, user_id: &str, body: &Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("authorization", format!("Bearer {}", self.token(user_id)))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
        )
        .await
    }

    pub async fn upload(
        &self,
        user_id: &str,
        file_name: &str,
        contents: &[u8],
        title: Option<&str>,
    ) -> (StatusCode, Value) {
        let boundary = "studyforge-test-boundary";
        let mut body = Vec::new();
        if let Some(title) = title {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{title}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/materials/upload")
                .header("authorization", format!("Bearer {}", self.token(user_id)))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Polls the material until extraction reaches a terminal state.
    pub async fn wait_for_extraction(&self, user_id: &str, material_id: &str) -> Value {
        for _ in 0..100 {
            let (status, body) = self
                .get(&format!("/api/v1/materials/{}", material_id), user_id)
                .await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == "completed" || body["status"] == "error" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("extraction of {} never finished", material_id);
    }
}

pub fn test_config() -> Config {
    let upload_dir: PathBuf = std::env::temp_dir().join(format!("studyforge-test-{}", Uuid::new_v4()));
    Config {
        upload_dir: upload_dir.to_string_lossy().into_owned(),
        ..Config::default()
    }
}

pub fn create_test_app(client: Arc<ScriptedClient>) -> TestApp {
    create_test_app_with_store(client, Arc::new(MemoryStore::new()))
}

pub fn create_test_app_with_store(client: Arc<ScriptedClient>, store: Arc<dyn Store>) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = test_config();
    let state = Arc::new(AppState::with_components(
        config.clone(),
        store.clone(),
        client.clone(),
        Arc::new(DocumentTextExtractor),
    ));

    TestApp {
        router: create_router(state),
        store,
        client,
        config,
    }
}

/// Material whose extraction has already completed with `text`.
pub async fn seed_material(store: &dyn Store, user_id: &str, text: Option<&str>) -> Material {
    let now = Utc::now();
    let id = Uuid::new_v4().to_string();
    let mut material = Material {
        id: id.clone(),
        user_id: user_id.to_string(),
        title: "Cell Biology".to_string(),
        subject: "Biology".to_string(),
        file_name: "cells.txt".to_string(),
        file_url: format!("/tmp/{}_cells.txt", id),
        file_size: 64,
        file_type: ".txt".to_string(),
        status: MaterialStatus::Uploading,
        extracted_text: None,
        word_count: 0,
        error_message: None,
        created_at: now,
        updated_at: now,
    };
    if let Some(text) = text {
        material.mark_completed(text.to_string());
    }
    store.insert_material(&material).await.unwrap();
    material
}

/// Provider reply with `count` true/false questions, all answered "true",
/// wrapped in prose.
pub fn quiz_reply(count: u32) -> String {
    let questions: Vec<Value> = (1..=count)
        .map(|id| {
            json!({
                "id": id,
                "type": "true_false",
                "question": format!("Statement {} about cells is accurate", id),
                "correct_answer": "true",
                "explanation": "Stated in the material",
                "difficulty": "easy"
            })
        })
        .collect();
    format!(
        "Here is your quiz:\n{}\nGood luck!",
        serde_json::to_string_pretty(&questions).unwrap()
    )
}

/// Single-page PDF whose text layer holds `text`.
pub fn pdf_with_text(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 18.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
