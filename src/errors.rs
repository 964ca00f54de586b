//! Error types for each stage of the classify-and-enrich pipeline.
//!
//! Only [`AppError`] ever reaches a client. Nutrition failures are recovered
//! inside the resolver and model load failures are folded into
//! [`crate::model::ModelState`], so both show up here only indirectly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::labels::LabelIndexError;

/// Invalid environment configuration detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Reasons the classifier could not reach the ready state.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact not found at {path} and MODEL_URL is not set")]
    MissingArtifact { path: String },

    #[error("failed to download model from {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("failed to write model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load weights: {0}")]
    Weights(String),

    #[error("built without torch support; rebuild with the `torch` feature")]
    RuntimeUnavailable,
}

/// Failure during a single forward pass.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("input tensor has {actual} values, expected {expected}")]
    InputShape { expected: usize, actual: usize },

    #[error("predicted class index {index} is outside the {len} known labels")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("inference runtime error: {0}")]
    Runtime(String),

    #[error("inference task aborted: {0}")]
    Aborted(String),
}

impl From<LabelIndexError> for InferenceError {
    fn from(err: LabelIndexError) -> Self {
        Self::IndexOutOfRange {
            index: err.index,
            len: err.len,
        }
    }
}

/// Decoded image the transform refuses to resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreprocessError {
    #[error("image has no pixels")]
    Empty,

    #[error("image is {width}x{height}; sides may differ by at most {max_ratio}:1")]
    ExtremeAspectRatio {
        width: u32,
        height: u32,
        max_ratio: u32,
    },
}

/// Why the external nutrition lookup was not used.
#[derive(Debug, Error)]
pub enum NutritionError {
    #[error("no nutrition API key configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service answered HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("no items returned for {query:?}")]
    Empty { query: String },

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("model is not available: {0}")]
    ModelUnavailable(String),

    #[error("no file uploaded")]
    MissingFile,

    #[error("invalid upload: {0}")]
    BadUpload(String),

    #[error("cannot open image file: {0}")]
    InvalidImage(String),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl From<PreprocessError> for AppError {
    fn from(err: PreprocessError) -> Self {
        Self::InvalidImage(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::BadUpload(_) | Self::InvalidImage(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ModelUnavailable(_) | Self::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "rejected request");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
