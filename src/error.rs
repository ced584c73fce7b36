//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::path::PathBuf;

use crate::logic::layout::LayoutMismatchError;

pub type AppResult<T> = Result<T, AppError>;

// ============================================================================
// DOMAIN ERRORS
// ============================================================================

/// Model artifact or reference data could not be loaded. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model artifact: {0}")]
    Invalid(String),

    #[error(transparent)]
    FeatureOrder(#[from] LayoutMismatchError),

    #[error("invalid reference dataset: {0}")]
    Reference(String),
}

/// Prediction failed for one request. The session keeps its previous state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("expected {expected} features, got {actual}")]
    WrongWidth { expected: usize, actual: usize },

    #[error("model produced a non-finite output ({0})")]
    NonFinite(f64),
}

/// Attribution failed. Prediction and advice still display.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplanationError {
    #[error("attribution produced a non-finite value")]
    NonFinite,

    #[error(
        "attribution does not reconstruct the positive-class probability: \
         link(base + sum) = {reconstructed:.9}, predicted = {predicted:.9}, tolerance = {tolerance:e}"
    )]
    Inconsistent { reconstructed: f64, predicted: f64, tolerance: f64 },
}

// ============================================================================
// HTTP BOUNDARY
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    // Resource errors
    NotFound(String),

    // Validation errors
    ValidationError(String),

    // Model errors
    InferenceError(InferenceError),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InferenceError(err) => {
                tracing::warn!("Inference error: {}", err);
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        AppError::InferenceError(err)
    }
}

impl From<axum::extract::rejection::FormRejection> for AppError {
    fn from(err: axum::extract::rejection::FormRejection) -> Self {
        AppError::ValidationError(err.body_text())
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::ValidationError(err.body_text())
    }
}
