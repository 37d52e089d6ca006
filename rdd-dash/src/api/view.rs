//! Current view state of a session

use axum::{extract::State, http::HeaderMap, Json};
use rdd_common::Identity;
use serde::Serialize;

use crate::api::auth::require_session;
use crate::error::ApiResult;
use crate::session::UiSession;
use crate::AppState;

/// What the page needs to render its header and result panel
#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub authenticated: bool,
    pub identity: Option<Identity>,
    pub busy: bool,
    pub message: String,
}

impl ViewResponse {
    pub fn from_session(ui: &UiSession) -> Self {
        let identity = ui.session.current();
        let view = ui.view();
        Self {
            authenticated: identity.is_some(),
            identity,
            busy: view.busy,
            message: view.message,
        }
    }
}

/// GET /api/view
pub async fn get_view(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ViewResponse>> {
    let ui = require_session(&state, &headers)?;
    Ok(Json(ViewResponse::from_session(&ui)))
}

/// DELETE /api/view/message
pub async fn dismiss_message(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ViewResponse>> {
    let ui = require_session(&state, &headers)?;
    ui.dismiss_message();
    Ok(Json(ViewResponse::from_session(&ui)))
}
