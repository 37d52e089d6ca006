//! Prediction history endpoint

use axum::{extract::State, http::HeaderMap, Json};
use rdd_common::PredictionRecord;
use serde::Serialize;

use crate::api::auth::require_identity;
use crate::error::ApiResult;
use crate::workflow::HistorySource;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<PredictionRecord>,
    /// `null` when both queries failed and the previous history is shown
    pub source: Option<HistorySource>,
}

/// GET /api/history
pub async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<HistoryResponse>> {
    let (ui, identity) = require_identity(&state, &headers)?;

    let response = match state.history.refresh(&ui, &identity).await {
        Some(page) => HistoryResponse {
            records: page.records,
            source: Some(page.source),
        },
        None => HistoryResponse {
            records: ui.history(),
            source: None,
        },
    };

    Ok(Json(response))
}
