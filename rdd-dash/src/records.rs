//! Prediction record store
//!
//! An append-only collection of prediction documents, queryable by owner.
//! The SQLite implementation keeps each record as a JSON document next to
//! an indexed `owner_id` column.

use async_trait::async_trait;
use chrono::Utc;
use rdd_common::PredictionRecord;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed record document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only prediction log
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a record, stamping the server time when the timestamp is unset.
    /// Returns the new record id.
    async fn append(&self, record: PredictionRecord) -> Result<String, StoreError>;

    /// Records whose owner id equals `owner_id`, in store order
    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<PredictionRecord>, StoreError>;

    /// Every record in the collection, in store order
    async fn list_all(&self) -> Result<Vec<PredictionRecord>, StoreError>;
}

/// Record store backed by the `predictions` table
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn decode_all(documents: Vec<String>) -> Result<Vec<PredictionRecord>, StoreError> {
    documents
        .iter()
        .map(|doc| serde_json::from_str(doc).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn append(&self, mut record: PredictionRecord) -> Result<String, StoreError> {
        if record.timestamp.is_none() {
            record.timestamp = Some(Utc::now());
        }

        let id = Uuid::new_v4().to_string();
        let document = serde_json::to_string(&record)?;

        sqlx::query("INSERT INTO predictions (id, owner_id, document) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(&record.owner_id)
            .bind(&document)
            .execute(&self.db)
            .await?;

        Ok(id)
    }

    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<PredictionRecord>, StoreError> {
        let documents: Vec<String> = sqlx::query_scalar(
            "SELECT document FROM predictions WHERE owner_id = ? ORDER BY rowid",
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        decode_all(documents)
    }

    async fn list_all(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        let documents: Vec<String> =
            sqlx::query_scalar("SELECT document FROM predictions ORDER BY rowid")
                .fetch_all(&self.db)
                .await?;

        decode_all(documents)
    }
}
