//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`; both storage errors and pipeline
//! failures convert into it with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use streamforge_common::Error;

use crate::pipeline::PipelineError;

/// Wrapper so we can implement `IntoResponse` for external error types.
#[derive(Debug)]
pub enum AppError {
    Common(Error),
    Pipeline(PipelineError),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Common(Error::not_found(what))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Common(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            // Rejected paths look exactly like missing files.
            AppError::Common(Error::NotFound(_) | Error::PathRejected(_)) => "not_found",
            AppError::Common(Error::Conflict(_)) => "conflict",
            AppError::Common(Error::InvalidInput(_)) => "validation_error",
            AppError::Common(Error::PayloadTooLarge { .. }) => "payload_too_large",
            AppError::Common(Error::Io(_)) => "io_error",
            AppError::Common(Error::Internal(_)) => "internal_error",
            AppError::Pipeline(_) => "pipeline_failed",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Common(Error::NotFound(_) | Error::PathRejected(_)) => {
                "not found".to_string()
            }
            AppError::Common(e) => e.to_string(),
            AppError::Pipeline(e) => e.to_string(),
        }
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::Common(e)
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Common(Error::PathRejected(detail)) => {
                tracing::debug!("Rejected path: {}", detail);
            }
            AppError::Pipeline(e) => {
                tracing::error!(stage = %e.stage, status = %status, "Pipeline failed: {}", e.cause);
            }
            AppError::Common(e) if status.is_server_error() => {
                tracing::error!(status = %status, error = %e, "Server error in handler");
            }
            _ => {}
        }

        let mut body = json!({
            "error": self.message(),
            "code": self.code(),
        });
        if let AppError::Pipeline(e) = &self {
            body["stage"] = json!(e.stage);
        }

        (status, axum::Json(body)).into_response()
    }
}
