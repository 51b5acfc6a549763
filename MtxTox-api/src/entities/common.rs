use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use mtx_tox_domain::DiagnosisError;

/// Error response format for API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code - machine-readable identifier
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    /// Create a not found error response
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error: "not_found".to_string(),
            message: message.into(),
        }
    }

    /// Create a validation error response
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self {
            error: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Create an internal error response
    pub fn internal_error() -> Self {
        Self {
            error: "internal_error".to_string(),
            message: "An unexpected error occurred".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DiagnosisError> for ErrorResponse {
    fn from(err: DiagnosisError) -> Self {
        match err {
            DiagnosisError::NotFound(what) => Self::not_found(format!("Not found: {}", what)),
            DiagnosisError::InvalidParameter(msg) => Self::validation_error(msg),
            DiagnosisError::InvalidRule(_) | DiagnosisError::Repository(_) => {
                error!("Diagnosis engine failure: {}", err);
                Self::internal_error()
            }
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}
