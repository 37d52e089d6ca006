//! HTTP API handlers for rdd-dash

pub mod auth;
pub mod health;
pub mod history;
pub mod predict;
pub mod ui;
pub mod view;

pub use auth::{login, logout, provider_sign_in, register};
pub use health::health_routes;
pub use history::get_history;
pub use predict::{predict_image, predict_tabular};
pub use ui::{serve_app_js, serve_index};
pub use view::{dismiss_message, get_view};
