//! Submission workflow
//!
//! One user-initiated prediction: call the prediction service, show its
//! message, then append the outcome to the record store. The append is
//! best effort; its result is reported in the outcome but never changes
//! what the user sees.
//!
//! When the prediction call itself fails nothing is persisted, on both the
//! image and the tabular path.

use rdd_common::{MeasurementRecord, PredictionRecord};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::prediction::{ImageUpload, PredictionService};
use crate::records::RecordStore;
use crate::session::UiSession;

pub const MISSING_IMAGE_MESSAGE: &str = "Please upload an image.";
pub const IMAGE_FAILURE_MESSAGE: &str = "Error processing the image. Please try again.";
pub const TABULAR_FAILURE_MESSAGE: &str = "Error processing tabular data. Please try again.";

/// Submission refused before any network activity
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("{0}")]
    Validation(String),

    #[error("Sign in to submit predictions")]
    NotSignedIn,

    #[error("A submission is already in progress")]
    Busy,
}

/// Result of the best-effort history write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Persisted { record_id: String },
    NotPersisted { reason: String },
}

/// What the user ends up seeing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The service answered; `message` is its text
    Predicted { message: String, record: RecordOutcome },
    /// The service call failed; `message` is the generic retry text
    Failed { message: String },
}

impl SubmissionOutcome {
    pub fn message(&self) -> &str {
        match self {
            SubmissionOutcome::Predicted { message, .. } => message,
            SubmissionOutcome::Failed { message } => message,
        }
    }
}

/// Orchestrates prediction calls and history writes
#[derive(Clone)]
pub struct SubmissionWorkflow {
    predictions: Arc<dyn PredictionService>,
    records: Arc<dyn RecordStore>,
}

impl SubmissionWorkflow {
    pub fn new(predictions: Arc<dyn PredictionService>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            predictions,
            records,
        }
    }

    /// Classify an uploaded leaf image
    pub async fn submit_image(
        &self,
        ui: &UiSession,
        image: Option<ImageUpload>,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let image =
            image.ok_or_else(|| SubmissionError::Validation(MISSING_IMAGE_MESSAGE.to_string()))?;
        let owner = ui.session.current().ok_or(SubmissionError::NotSignedIn)?;
        let _busy = ui.begin_submission().ok_or(SubmissionError::Busy)?;

        match self.predictions.predict_image(&image).await {
            Ok(message) => {
                info!(owner_id = %owner.id, file_name = %image.file_name, "Image prediction succeeded");
                ui.set_message(message.clone());
                let record = self
                    .persist(PredictionRecord::image(&owner, message.clone()))
                    .await;
                Ok(SubmissionOutcome::Predicted { message, record })
            }
            Err(e) => {
                error!(owner_id = %owner.id, error = %e, "Image prediction failed");
                ui.set_message(IMAGE_FAILURE_MESSAGE);
                Ok(SubmissionOutcome::Failed {
                    message: IMAGE_FAILURE_MESSAGE.to_string(),
                })
            }
        }
    }

    /// Classify growing conditions from six measurements
    pub async fn submit_measurements(
        &self,
        ui: &UiSession,
        measurements: MeasurementRecord,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        measurements
            .validate()
            .map_err(|e| SubmissionError::Validation(e.to_string()))?;
        let owner = ui.session.current().ok_or(SubmissionError::NotSignedIn)?;
        let _busy = ui.begin_submission().ok_or(SubmissionError::Busy)?;

        match self.predictions.predict_tabular(&measurements).await {
            Ok(message) => {
                info!(owner_id = %owner.id, "Environmental prediction succeeded");
                ui.set_message(message.clone());
                let record = self
                    .persist(PredictionRecord::tabular(&owner, message.clone(), measurements))
                    .await;
                Ok(SubmissionOutcome::Predicted { message, record })
            }
            Err(e) => {
                error!(owner_id = %owner.id, error = %e, "Environmental prediction failed");
                ui.set_message(TABULAR_FAILURE_MESSAGE);
                Ok(SubmissionOutcome::Failed {
                    message: TABULAR_FAILURE_MESSAGE.to_string(),
                })
            }
        }
    }

    async fn persist(&self, record: PredictionRecord) -> RecordOutcome {
        let kind = record.kind;
        let owner_id = record.owner_id.clone();

        match self.records.append(record).await {
            Ok(record_id) => {
                info!(owner_id = %owner_id, kind = ?kind, record_id = %record_id, "Saved prediction record");
                RecordOutcome::Persisted { record_id }
            }
            Err(e) => {
                warn!(owner_id = %owner_id, kind = ?kind, error = %e, "Prediction record not saved (prediction still succeeded)");
                RecordOutcome::NotPersisted {
                    reason: e.to_string(),
                }
            }
        }
    }
}

