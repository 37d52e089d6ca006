//! # RDD Common Library
//!
//! Shared code for the rice disease detection dashboard including:
//! - Prediction and measurement records
//! - Identity derived from the account directory
//! - Configuration loading
//! - Database initialization
//! - Signed sign-in assertions

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{Identity, MeasurementRecord, PredictionKind, PredictionRecord};
