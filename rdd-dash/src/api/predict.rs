//! Prediction submission endpoints
//!
//! A failed prediction call is not an HTTP error: the response is 200 with
//! `status: "failed"` and the message the user should see.

use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use rdd_common::MeasurementRecord;
use serde::Serialize;

use crate::api::auth::require_session;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::prediction::ImageUpload;
use crate::workflow::{RecordOutcome, SubmissionOutcome};
use crate::AppState;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Predicted,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub status: SubmissionStatus,
    pub message: String,
    pub record: Option<RecordOutcome>,
    pub busy: bool,
}

impl SubmissionResponse {
    fn new(outcome: SubmissionOutcome, busy: bool) -> Self {
        match outcome {
            SubmissionOutcome::Predicted { message, record } => Self {
                status: SubmissionStatus::Predicted,
                message,
                record: Some(record),
                busy,
            },
            SubmissionOutcome::Failed { message } => Self {
                status: SubmissionStatus::Failed,
                message,
                record: None,
                busy,
            },
        }
    }
}

async fn read_image(mut multipart: Multipart) -> ApiResult<Option<ImageUpload>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?;

        // An empty file input still posts a nameless, empty part
        if file_name.is_empty() && bytes.is_empty() {
            return Ok(None);
        }

        return Ok(Some(ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }

    Ok(None)
}

/// POST /api/predict/image
pub async fn predict_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<SubmissionResponse>> {
    let ui = require_session(&state, &headers)?;
    let image = read_image(multipart).await?;

    let outcome = state.submissions.submit_image(&ui, image).await?;
    Ok(Json(SubmissionResponse::new(outcome, ui.view().busy)))
}

/// POST /api/predict/tabular
pub async fn predict_tabular(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(measurements): ApiJson<MeasurementRecord>,
) -> ApiResult<Json<SubmissionResponse>> {
    let ui = require_session(&state, &headers)?;

    let outcome = state.submissions.submit_measurements(&ui, measurements).await?;
    Ok(Json(SubmissionResponse::new(outcome, ui.view().busy)))
}
