//! rdd-dash library - rice disease detection dashboard
//!
//! Serves the dashboard page and a JSON API that signs users in, submits
//! leaf images or field measurements to the prediction service, and reads
//! back each user's prediction history.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod accounts;
pub mod api;
pub mod error;
pub mod prediction;
pub mod records;
pub mod session;
pub mod workflow;

use accounts::{AccountService, SqliteAccountDirectory};
use prediction::PredictionService;
use records::{RecordStore, SqliteRecordStore};
use session::SessionRegistry;
use workflow::{HistoryWorkflow, SubmissionWorkflow};

/// Largest accepted image upload
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub accounts: Arc<dyn AccountService>,
    pub submissions: SubmissionWorkflow,
    pub history: HistoryWorkflow,
}

impl AppState {
    /// Wire the workflows to their collaborators
    pub fn new(
        predictions: Arc<dyn PredictionService>,
        accounts: Arc<dyn AccountService>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new()),
            accounts,
            submissions: SubmissionWorkflow::new(predictions, Arc::clone(&records)),
            history: HistoryWorkflow::new(records),
        }
    }

    /// Account directory and record store both backed by `db`
    pub fn with_database(db: SqlitePool, predictions: Arc<dyn PredictionService>) -> Self {
        Self::new(
            predictions,
            Arc::new(SqliteAccountDirectory::new(db.clone())),
            Arc::new(SqliteRecordStore::new(db)),
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    let api = Router::new()
        .route("/api/auth/login", post(api::login))
        .route("/api/auth/register", post(api::register))
        .route("/api/auth/provider", post(api::provider_sign_in))
        .route("/api/auth/logout", post(api::logout))
        .route("/api/view", get(api::get_view))
        .route("/api/view/message", delete(api::dismiss_message))
        .route(
            "/api/predict/image",
            post(api::predict_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/api/predict/tabular", post(api::predict_tabular))
        .route("/api/history", get(api::get_history));

    let public = Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .merge(api::health_routes());

    Router::new()
        .merge(api)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
