use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions, UpdateOptions},
    Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};

use super::{Store, StoreError, StoreResult};
use crate::metrics::track_db_operation;
use crate::models::{Material, Quiz, QuizAttempt, Summary, SummaryView};

const MATERIALS: &str = "materials";
const SUMMARIES: &str = "summaries";
const QUIZZES: &str = "quizzes";
const QUIZ_ATTEMPTS: &str = "quiz_attempts";
const SUMMARY_VIEWS: &str = "summary_views";

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Wraps the database and makes sure the per-material unique indexes exist.
    pub async fn new(db: Database) -> StoreResult<Self> {
        let store = Self { db };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        for name in [SUMMARIES, QUIZZES] {
            let index = IndexModel::builder()
                .keys(doc! { "material_id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.db
                .collection::<Document>(name)
                .create_index(index)
                .await
                .map_err(backend_error)?;
        }

        let by_user = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1 })
            .build();
        self.db
            .collection::<Document>(MATERIALS)
            .create_index(by_user)
            .await
            .map_err(backend_error)?;

        let attempts_by_quiz = IndexModel::builder()
            .keys(doc! { "quiz_id": 1, "user_id": 1 })
            .build();
        self.db
            .collection::<Document>(QUIZ_ATTEMPTS)
            .create_index(attempts_by_quiz)
            .await
            .map_err(backend_error)?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    async fn insert<T>(&self, name: &str, record: &T) -> StoreResult<()>
    where
        T: Serialize + Send + Sync,
    {
        let collection = self.collection::<T>(name);
        track_db_operation("insert", name, async {
            collection
                .insert_one(record)
                .await
                .map(|_| ())
                .map_err(write_error)
        })
        .await
    }

    async fn find_one_by<T>(&self, name: &str, field: &str, value: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let collection = self.collection::<T>(name);
        let mut filter = Document::new();
        filter.insert(field, value);
        track_db_operation("find_one", name, async {
            collection
                .find_one(filter)
                .await
                .map_err(read_error)
        })
        .await
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn insert_material(&self, material: &Material) -> StoreResult<()> {
        self.insert(MATERIALS, material).await
    }

    async fn get_material(&self, id: &str) -> StoreResult<Option<Material>> {
        self.find_one_by(MATERIALS, "_id", id).await
    }

    async fn list_materials_by_user(&self, user_id: &str) -> StoreResult<Vec<Material>> {
        let collection = self.collection::<Material>(MATERIALS);
        track_db_operation("find", MATERIALS, async {
            let options = FindOptions::builder()
                .sort(doc! { "created_at": -1 })
                .build();
            let cursor = collection
                .find(doc! { "user_id": user_id })
                .with_options(options)
                .await
                .map_err(read_error)?;
            cursor.try_collect().await.map_err(read_error)
        })
        .await
    }

    async fn replace_material(&self, material: &Material) -> StoreResult<()> {
        let collection = self.collection::<Material>(MATERIALS);
        track_db_operation("replace", MATERIALS, async {
            let result = collection
                .replace_one(doc! { "_id": &material.id }, material)
                .await
                .map_err(write_error)?;
            if result.matched_count == 0 {
                return Err(StoreError::Missing);
            }
            Ok(())
        })
        .await
    }

    async fn find_summary_by_material(&self, material_id: &str) -> StoreResult<Option<Summary>> {
        self.find_one_by(SUMMARIES, "material_id", material_id)
            .await
    }

    async fn insert_summary(&self, summary: &Summary) -> StoreResult<()> {
        self.insert(SUMMARIES, summary).await
    }

    async fn get_quiz(&self, id: &str) -> StoreResult<Option<Quiz>> {
        self.find_one_by(QUIZZES, "_id", id).await
    }

    async fn find_quiz_by_material(&self, material_id: &str) -> StoreResult<Option<Quiz>> {
        self.find_one_by(QUIZZES, "material_id", material_id).await
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> StoreResult<()> {
        self.insert(QUIZZES, quiz).await
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        self.insert(QUIZ_ATTEMPTS, attempt).await
    }

    async fn list_attempts(&self, user_id: &str, quiz_id: &str) -> StoreResult<Vec<QuizAttempt>> {
        let collection = self.collection::<QuizAttempt>(QUIZ_ATTEMPTS);
        track_db_operation("find", QUIZ_ATTEMPTS, async {
            let cursor = collection
                .find(doc! { "user_id": user_id, "quiz_id": quiz_id })
                .await
                .map_err(read_error)?;
            cursor.try_collect().await.map_err(read_error)
        })
        .await
    }

    async fn record_summary_view(
        &self,
        user_id: &str,
        material_id: &str,
        viewed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let collection = self.collection::<Document>(SUMMARY_VIEWS);
        let viewed_at = to_bson(&viewed_at).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let filter = doc! { "_id": SummaryView::key(user_id, material_id) };
        let update = doc! {
            "$setOnInsert": {
                "user_id": user_id,
                "material_id": material_id,
                "first_viewed_at": viewed_at.clone(),
            },
            "$set": { "last_viewed_at": viewed_at },
        };

        track_db_operation("upsert", SUMMARY_VIEWS, async {
            let upsert = || {
                collection
                    .update_one(filter.clone(), update.clone())
                    .with_options(UpdateOptions::builder().upsert(true).build())
            };
            match upsert().await {
                // A concurrent first view inserted the document; it matches now.
                Err(e) if is_duplicate_key(&e) => upsert().await.map(|_| ()).map_err(write_error),
                result => result.map(|_| ()).map_err(write_error),
            }
        })
        .await
    }

    async fn find_summary_view(
        &self,
        user_id: &str,
        material_id: &str,
    ) -> StoreResult<Option<SummaryView>> {
        self.find_one_by(SUMMARY_VIEWS, "_id", &SummaryView::key(user_id, material_id))
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(backend_error)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    if let ErrorKind::Write(WriteFailure::WriteError(ref we)) = *err.kind {
        return we.code == 11000;
    }
    false
}

fn write_error(err: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&err) {
        StoreError::Duplicate
    } else {
        backend_error(err)
    }
}

fn read_error(err: mongodb::error::Error) -> StoreError {
    match *err.kind {
        ErrorKind::BsonDeserialization(ref e) => StoreError::Serialization(e.to_string()),
        _ => backend_error(err),
    }
}

fn backend_error(err: mongodb::error::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
