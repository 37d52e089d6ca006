//! Sign-in, registration and sign-out
//!
//! A browser tab identifies its session with `Authorization: Bearer <token>`.
//! Signing in without a known token opens a new session; the token is
//! returned in the response. Signing out drops the session and its token.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use rdd_common::auth::AssertionError;
use rdd_common::Identity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::{AccountError, AccountProfile, Credentials, FederatedAssertion};
use crate::api::view::ViewResponse;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::session::UiSession;
use crate::AppState;

pub const LOGIN_FAILED_MESSAGE: &str = "Invalid email or password.";
pub const PROVIDER_FAILED_MESSAGE: &str = "Provider sign-in failed. Please try again.";
pub const PASSWORD_MISMATCH_MESSAGE: &str = "Passwords do not match.";

/// Registration form
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Returned by every successful sign-in flow
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub identity: Identity,
}

/// Session token from the `Authorization` header
pub(crate) fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim()
        .parse()
        .ok()
}

/// Session named by the request, or 401
pub(crate) fn require_session(state: &AppState, headers: &HeaderMap) -> ApiResult<Arc<UiSession>> {
    session_token(headers)
        .and_then(|token| state.sessions.get(&token))
        .ok_or_else(|| ApiError::Unauthorized("Missing or unknown session".to_string()))
}

/// Signed-in session named by the request, or 401
pub(crate) fn require_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> ApiResult<(Arc<UiSession>, Identity)> {
    let ui = require_session(state, headers)?;
    let identity = ui
        .session
        .current()
        .ok_or_else(|| ApiError::Unauthorized("Not signed in".to_string()))?;
    Ok((ui, identity))
}

fn establish_session(state: &AppState, headers: &HeaderMap, profile: AccountProfile) -> SessionResponse {
    let (token, ui) = match session_token(headers)
        .and_then(|token| state.sessions.get(&token).map(|ui| (token, ui)))
    {
        Some(existing) => existing,
        None => state.sessions.create(),
    };

    let identity = Identity::from_account(profile.uid, profile.email.as_deref());
    if let Some(previous) = ui.session.current() {
        if previous.id != identity.id {
            ui.sign_out();
        }
    }
    ui.session.sign_in(identity.clone());
    info!(owner_id = %identity.id, "Session authenticated");

    SessionResponse {
        session_id: token.to_string(),
        identity,
    }
}

fn directory_failure(err: AccountError, user_message: String) -> ApiError {
    match err {
        AccountError::Directory(e) => ApiError::Internal(e.to_string()),
        AccountError::Assertion(AssertionError::Secret(e)) => ApiError::Internal(e),
        other => {
            warn!(error = %other, "Account request rejected");
            ApiError::Unauthorized(user_message)
        }
    }
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<Json<SessionResponse>> {
    let profile = state
        .accounts
        .sign_in_with_password(&credentials)
        .await
        .map_err(|e| directory_failure(e, LOGIN_FAILED_MESSAGE.to_string()))?;

    Ok(Json(establish_session(&state, &headers, profile)))
}

/// POST /api/auth/provider
pub async fn provider_sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(assertion): ApiJson<FederatedAssertion>,
) -> ApiResult<Json<SessionResponse>> {
    let profile = state
        .accounts
        .sign_in_with_provider(&assertion)
        .await
        .map_err(|e| directory_failure(e, PROVIDER_FAILED_MESSAGE.to_string()))?;

    Ok(Json(establish_session(&state, &headers, profile)))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<Json<SessionResponse>> {
    if request.password != request.confirm_password {
        return Err(ApiError::BadRequest(PASSWORD_MISMATCH_MESSAGE.to_string()));
    }

    let credentials = Credentials {
        email: request.email,
        password: request.password,
    };
    let profile = state
        .accounts
        .register(&credentials)
        .await
        .map_err(|e| match e {
            AccountError::Directory(e) => ApiError::Internal(e.to_string()),
            other => ApiError::BadRequest(format!("Registration failed. {}", other)),
        })?;

    Ok(Json(establish_session(&state, &headers, profile)))
}

/// POST /api/auth/logout
///
/// The session is removed from the registry; its token is no longer valid.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ViewResponse>> {
    let ui = session_token(&headers)
        .and_then(|token| state.sessions.remove(&token))
        .ok_or_else(|| ApiError::Unauthorized("Missing or unknown session".to_string()))?;

    if let Some(identity) = ui.sign_out() {
        info!(owner_id = %identity.id, "Session signed out");
        if let Err(e) = state.accounts.sign_out(&identity.id).await {
            warn!(owner_id = %identity.id, error = %e, "Account service sign-out failed");
        }
    }

    Ok(Json(ViewResponse::from_session(&ui)))
}
