//! Submission workflow tests
//!
//! Prediction calls, the best-effort record write and the busy flag.

mod helpers;

use async_trait::async_trait;
use helpers::{
    leaf_image, measurements, signed_in_ui, MemoryRecordStore, StubPredictionService,
};
use rdd_common::{MeasurementRecord, PredictionKind};
use rdd_dash::prediction::{ImageUpload, PredictionError, PredictionService};
use rdd_dash::session::UiSession;
use rdd_dash::workflow::submission::{
    IMAGE_FAILURE_MESSAGE, MISSING_IMAGE_MESSAGE, TABULAR_FAILURE_MESSAGE,
};
use rdd_dash::workflow::{RecordOutcome, SubmissionError, SubmissionOutcome, SubmissionWorkflow};
use std::sync::Arc;
use tokio::sync::Notify;

fn workflow(
    predictions: Arc<StubPredictionService>,
    records: Arc<MemoryRecordStore>,
) -> SubmissionWorkflow {
    SubmissionWorkflow::new(predictions, records)
}

// =============================================================================
// Image path
// =============================================================================

#[tokio::test]
async fn test_missing_image_is_rejected_before_any_call() {
    let predictions = StubPredictionService::answering("Leaf appears healthy");
    let records = MemoryRecordStore::new();
    let ui = signed_in_ui("alice");
    ui.set_message("previous result");

    let result = workflow(predictions.clone(), records.clone())
        .submit_image(&ui, None)
        .await;

    assert_eq!(
        result,
        Err(SubmissionError::Validation(MISSING_IMAGE_MESSAGE.to_string()))
    );
    assert_eq!(predictions.calls(), 0);
    assert!(records.snapshot().is_empty());
    let view = ui.view();
    assert!(!view.busy);
    assert_eq!(view.message, "previous result");
}

#[tokio::test]
async fn test_image_success_shows_message_and_logs_one_record() {
    let predictions = StubPredictionService::answering("Leaf appears healthy");
    let records = MemoryRecordStore::new();
    let ui = signed_in_ui("alice");

    let outcome = workflow(predictions.clone(), records.clone())
        .submit_image(&ui, Some(leaf_image()))
        .await
        .unwrap();

    assert_eq!(outcome.message(), "Leaf appears healthy");
    assert!(matches!(
        outcome,
        SubmissionOutcome::Predicted { record: RecordOutcome::Persisted { .. }, .. }
    ));

    let view = ui.view();
    assert!(!view.busy);
    assert_eq!(view.message, "Leaf appears healthy");

    let stored = records.snapshot();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, PredictionKind::Image);
    assert_eq!(stored[0].result, "Leaf appears healthy");
    assert_eq!(stored[0].owner_id, "alice");
    assert_eq!(stored[0].owner_name, "alice");
    assert!(stored[0].data.is_none());
    assert!(stored[0].timestamp.is_some());
}

#[tokio::test]
async fn test_persistence_failure_does_not_change_message() {
    let predictions = StubPredictionService::answering("Leaf appears healthy");
    let records = MemoryRecordStore::failing_appends();
    let ui = signed_in_ui("alice");

    let outcome = workflow(predictions, records.clone())
        .submit_image(&ui, Some(leaf_image()))
        .await
        .unwrap();

    match outcome {
        SubmissionOutcome::Predicted { message, record } => {
            assert_eq!(message, "Leaf appears healthy");
            assert!(matches!(record, RecordOutcome::NotPersisted { .. }));
        }
        other => panic!("expected a prediction, got {:?}", other),
    }

    let view = ui.view();
    assert!(!view.busy);
    assert_eq!(view.message, "Leaf appears healthy");
    assert!(records.snapshot().is_empty());
}

#[tokio::test]
async fn test_image_service_failure_shows_generic_message_and_skips_log() {
    let predictions = StubPredictionService::failing();
    let records = MemoryRecordStore::new();
    let ui = signed_in_ui("alice");

    let outcome = workflow(predictions.clone(), records.clone())
        .submit_image(&ui, Some(leaf_image()))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SubmissionOutcome::Failed {
            message: IMAGE_FAILURE_MESSAGE.to_string()
        }
    );
    assert_eq!(predictions.calls(), 1);
    assert!(records.snapshot().is_empty());

    let view = ui.view();
    assert!(!view.busy);
    assert_eq!(view.message, IMAGE_FAILURE_MESSAGE);
}

#[tokio::test]
async fn test_anonymous_session_cannot_submit() {
    let predictions = StubPredictionService::answering("ok");
    let records = MemoryRecordStore::new();
    let ui = UiSession::new();

    let result = workflow(predictions.clone(), records)
        .submit_image(&ui, Some(leaf_image()))
        .await;

    assert_eq!(result, Err(SubmissionError::NotSignedIn));
    assert_eq!(predictions.calls(), 0);
    assert!(!ui.view().busy);
}

// =============================================================================
// Tabular path
// =============================================================================

#[tokio::test]
async fn test_measurements_persist_exact_input_map() {
    let predictions = StubPredictionService::answering("Conditions favorable");
    let records = MemoryRecordStore::new();
    let ui = signed_in_ui("bob");
    let input = measurements();

    let outcome = workflow(predictions.clone(), records.clone())
        .submit_measurements(&ui, input.clone())
        .await
        .unwrap();

    assert_eq!(outcome.message(), "Conditions favorable");
    assert_eq!(ui.view().message, "Conditions favorable");
    assert_eq!(
        predictions.last_tabular.lock().unwrap().as_ref(),
        Some(&input)
    );

    let stored = records.snapshot();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, PredictionKind::Tabular);
    assert_eq!(stored[0].data.as_ref(), Some(&input));

    let document = serde_json::to_value(&stored[0]).unwrap();
    assert_eq!(document["data"], serde_json::to_value(&input).unwrap());
    assert_eq!(document["data"].as_object().unwrap().len(), 6);
}

#[tokio::test]
async fn test_invalid_measurements_block_before_any_call() {
    let predictions = StubPredictionService::answering("ok");
    let records = MemoryRecordStore::new();
    let ui = signed_in_ui("bob");

    let mut input = measurements();
    input.relative_humidity = String::new();
    let result = workflow(predictions.clone(), records.clone())
        .submit_measurements(&ui, input)
        .await;
    assert_eq!(
        result,
        Err(SubmissionError::Validation("Relative_Humidity is required".to_string()))
    );

    let result = workflow(predictions.clone(), records.clone())
        .submit_measurements(&ui, MeasurementRecord {
            soil_ph: "acidic".to_string(),
            ..measurements()
        })
        .await;
    assert!(matches!(result, Err(SubmissionError::Validation(_))));

    assert_eq!(predictions.calls(), 0);
    assert!(records.snapshot().is_empty());
}

#[tokio::test]
async fn test_tabular_service_failure_clears_busy_and_skips_log() {
    let predictions = StubPredictionService::failing();
    let records = MemoryRecordStore::new();
    let ui = signed_in_ui("bob");

    let outcome = workflow(predictions, records.clone())
        .submit_measurements(&ui, measurements())
        .await
        .unwrap();

    assert_eq!(outcome.message(), TABULAR_FAILURE_MESSAGE);
    assert!(!ui.view().busy);
    assert!(records.snapshot().is_empty());
}

// =============================================================================
// Busy flag
// =============================================================================

/// Holds every call until released
struct GatedPredictionService {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl PredictionService for GatedPredictionService {
    async fn predict_image(&self, _image: &ImageUpload) -> Result<String, PredictionError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("Leaf appears healthy".to_string())
    }

    async fn predict_tabular(&self, _record: &MeasurementRecord) -> Result<String, PredictionError> {
        self.entered.notify_one();
        self.release.notified().await;
        Err(PredictionError::Http(500, "Internal Server Error".to_string()))
    }
}

#[tokio::test]
async fn test_busy_flag_held_during_call_and_blocks_double_submit() {
    let gate = Arc::new(GatedPredictionService {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let records = MemoryRecordStore::new();
    let workflow = SubmissionWorkflow::new(gate.clone(), records.clone());
    let ui = Arc::new(signed_in_ui("carol"));

    let first = {
        let workflow = workflow.clone();
        let ui = Arc::clone(&ui);
        tokio::spawn(async move { workflow.submit_image(&ui, Some(leaf_image())).await })
    };

    gate.entered.notified().await;
    assert!(ui.view().busy);

    let second = workflow.submit_image(&ui, Some(leaf_image())).await;
    assert_eq!(second, Err(SubmissionError::Busy));

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();

    assert_eq!(outcome.message(), "Leaf appears healthy");
    assert!(!ui.view().busy);
    assert_eq!(records.snapshot().len(), 1);
}

#[tokio::test]
async fn test_busy_flag_cleared_when_call_rejects() {
    let gate = Arc::new(GatedPredictionService {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let workflow = SubmissionWorkflow::new(gate.clone(), MemoryRecordStore::new());
    let ui = Arc::new(signed_in_ui("carol"));

    let pending = {
        let workflow = workflow.clone();
        let ui = Arc::clone(&ui);
        tokio::spawn(async move { workflow.submit_measurements(&ui, measurements()).await })
    };

    gate.entered.notified().await;
    assert!(ui.view().busy);
    gate.release.notify_one();

    let outcome = pending.await.unwrap().unwrap();
    assert_eq!(outcome.message(), TABULAR_FAILURE_MESSAGE);
    assert!(!ui.view().busy);
}

#[tokio::test]
async fn test_busy_flag_cleared_when_submission_is_cancelled() {
    let gate = Arc::new(GatedPredictionService {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let workflow = SubmissionWorkflow::new(gate.clone(), MemoryRecordStore::new());
    let ui = Arc::new(signed_in_ui("carol"));

    let pending = {
        let workflow = workflow.clone();
        let ui = Arc::clone(&ui);
        tokio::spawn(async move { workflow.submit_image(&ui, Some(leaf_image())).await })
    };

    gate.entered.notified().await;
    assert!(ui.view().busy);

    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());
    assert!(!ui.view().busy);
}
