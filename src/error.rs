//! Error types for the Collate server
//!
//! Every client-visible failure carries a stable machine code alongside a
//! human-readable message. Internal failures are logged in full and surfaced
//! as a generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::artifacts::StoreError;
use crate::assembly::AssemblyError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Assembly(e) => match e {
                AssemblyError::EmptyPlan
                | AssemblyError::UnknownSource(_)
                | AssemblyError::ZeroPages => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                AssemblyError::SourceLoad { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "SOURCE_LOAD_FAILED")
                }
                AssemblyError::PageOutOfRange { .. } => {
                    (StatusCode::BAD_REQUEST, "PAGE_INDEX_OUT_OF_RANGE")
                }
                AssemblyError::TooManyPages { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "PLAN_TOO_LARGE")
                }
                AssemblyError::Pdf(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            AppError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Store(StoreError::Io(_)) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self);
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let (status, code) = AppError::Validation("bad input".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn page_out_of_range_has_its_own_code() {
        let error = AppError::Assembly(AssemblyError::PageOutOfRange {
            source_index: 0,
            page_index: 7,
            page_count: 5,
        });
        let (status, code) = error.status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "PAGE_INDEX_OUT_OF_RANGE");
    }

    #[test]
    fn missing_artifact_maps_to_404() {
        let error = AppError::Store(StoreError::NotFound("h".into()));
        let (status, code) = error.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn capacity_maps_to_413() {
        let error = AppError::Assembly(AssemblyError::TooManyPages {
            requested: 5000,
            max: 2000,
        });
        let (status, code) = error.status_and_code();
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(code, "PLAN_TOO_LARGE");
    }

    #[test]
    fn io_failures_are_generic_internal_errors() {
        let error = AppError::Store(StoreError::Io(std::io::Error::other("disk full")));
        let (status, code) = error.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
    }
}
