//! Shared test doubles for rdd-dash integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rdd_common::{Identity, MeasurementRecord, PredictionRecord};
use rdd_dash::prediction::{ImageUpload, PredictionError, PredictionService};
use rdd_dash::records::{RecordStore, StoreError};
use rdd_dash::session::UiSession;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Prediction service answering with a fixed message, or failing
pub struct StubPredictionService {
    message: String,
    fail: AtomicBool,
    pub image_calls: AtomicUsize,
    pub tabular_calls: AtomicUsize,
    pub last_tabular: Mutex<Option<MeasurementRecord>>,
}

impl StubPredictionService {
    pub fn answering(message: &str) -> Arc<Self> {
        Arc::new(Self {
            message: message.to_string(),
            fail: AtomicBool::new(false),
            image_calls: AtomicUsize::new(0),
            tabular_calls: AtomicUsize::new(0),
            last_tabular: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        let stub = Self::answering("");
        stub.fail.store(true, Ordering::SeqCst);
        stub
    }

    pub fn calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst) + self.tabular_calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Result<String, PredictionError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PredictionError::Network("connection refused".to_string()))
        } else {
            Ok(self.message.clone())
        }
    }
}

#[async_trait]
impl PredictionService for StubPredictionService {
    async fn predict_image(&self, _image: &ImageUpload) -> Result<String, PredictionError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.answer()
    }

    async fn predict_tabular(&self, record: &MeasurementRecord) -> Result<String, PredictionError> {
        self.tabular_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_tabular.lock().unwrap() = Some(record.clone());
        self.answer()
    }
}

/// In-memory record store with switchable failures
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<PredictionRecord>>,
    pub fail_append: AtomicBool,
    pub fail_owner_query: AtomicBool,
    pub fail_list_all: AtomicBool,
    pub owner_queries: AtomicUsize,
    pub full_scans: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_appends() -> Arc<Self> {
        let store = Self::default();
        store.fail_append.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    /// Insert a record as-is, bypassing the append stamping
    pub fn seed(&self, record: PredictionRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn snapshot(&self) -> Vec<PredictionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn append(&self, mut record: PredictionRecord) -> Result<String, StoreError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("permission denied".to_string()));
        }
        if record.timestamp.is_none() {
            record.timestamp = Some(Utc::now());
        }
        let mut records = self.records.lock().unwrap();
        records.push(record);
        Ok(format!("rec-{}", records.len()))
    }

    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<PredictionRecord>, StoreError> {
        self.owner_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_owner_query.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("missing index".to_string()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        self.full_scans.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_all.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("permission denied".to_string()));
        }
        Ok(self.records.lock().unwrap().clone())
    }
}

pub fn identity(uid: &str) -> Identity {
    Identity::from_account(uid, Some(&format!("{}@example.com", uid)))
}

/// Tab with `uid` signed in
pub fn signed_in_ui(uid: &str) -> UiSession {
    let ui = UiSession::new();
    ui.session.sign_in(identity(uid));
    ui
}

pub fn leaf_image() -> ImageUpload {
    ImageUpload {
        file_name: "leaf.jpg".to_string(),
        content_type: Some("image/jpeg".to_string()),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
    }
}

pub fn measurements() -> MeasurementRecord {
    MeasurementRecord {
        maximum_temperature: "34.5".to_string(),
        minimum_temperature: "22.0".to_string(),
        average_temperature: "28.3".to_string(),
        precipitation: "112".to_string(),
        soil_ph: "6.4".to_string(),
        relative_humidity: "78".to_string(),
    }
}
