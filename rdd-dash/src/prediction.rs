//! Prediction service client
//!
//! The prediction service is a remote HTTP endpoint that classifies a leaf
//! image or a set of environmental measurements and answers with a
//! human-readable `message`.

use async_trait::async_trait;
use rdd_common::MeasurementRecord;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

const USER_AGENT: &str = concat!("rdd-dash/", env!("CARGO_PKG_VERSION"));
const IMAGE_ENDPOINT: &str = "predict-image/";
const TABULAR_ENDPOINT: &str = "predict-tabular/";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Prediction service errors
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}: {1}")]
    Http(u16, String),

    #[error("Prediction service reported an error: {0}")]
    Service(String),

    #[error("Response carried no message")]
    MissingMessage,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
}

/// Image selected in the upload form
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Body returned by both prediction endpoints
///
/// The service answers failures with HTTP 200 and an `error` field in
/// place of `message`.
#[derive(Debug, Deserialize)]
struct PredictionResponse {
    message: Option<String>,
    error: Option<String>,
}

impl PredictionResponse {
    fn into_message(self) -> Result<String, PredictionError> {
        if let Some(error) = self.error {
            return Err(PredictionError::Service(error));
        }
        self.message.ok_or(PredictionError::MissingMessage)
    }
}

/// Remote classifier
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Classify a leaf image, returning the display message
    async fn predict_image(&self, image: &ImageUpload) -> Result<String, PredictionError>;

    /// Classify growing conditions, returning the display message
    async fn predict_tabular(&self, record: &MeasurementRecord) -> Result<String, PredictionError>;
}

/// reqwest-backed prediction service client
pub struct HttpPredictionClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpPredictionClient {
    /// Create a client for the service at `base_url`
    ///
    /// No request timeout is set beyond reqwest's defaults.
    pub fn new(base_url: impl Into<String>) -> Result<Self, PredictionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read_message(response: reqwest::Response) -> Result<String, PredictionError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PredictionError::Http(status.as_u16(), error_text));
        }

        let body: PredictionResponse = response
            .json()
            .await
            .map_err(|e| PredictionError::Parse(e.to_string()))?;

        body.into_message()
    }
}

#[async_trait]
impl PredictionService for HttpPredictionClient {
    async fn predict_image(&self, image: &ImageUpload) -> Result<String, PredictionError> {
        let content_type = image.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(content_type)
            .map_err(|e| PredictionError::InvalidUpload(e.to_string()))?;
        let form = Form::new().part("file", part);

        tracing::debug!(
            file_name = %image.file_name,
            size = image.bytes.len(),
            "Posting image to prediction service"
        );

        let response = self
            .http_client
            .post(self.endpoint(IMAGE_ENDPOINT))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        Self::read_message(response).await
    }

    async fn predict_tabular(&self, record: &MeasurementRecord) -> Result<String, PredictionError> {
        tracing::debug!("Posting measurements to prediction service");

        let response = self
            .http_client
            .post(self.endpoint(TABULAR_ENDPOINT))
            .json(record)
            .send()
            .await
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        Self::read_message(response).await
    }
}
