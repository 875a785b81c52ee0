use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::extractor::ExtractionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    UnsupportedDocumentType(String),

    #[error("{0}")]
    NoExtractableText(String),

    #[error("{0}")]
    MalformedDocument(String),

    #[error("Upload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ExtractionError> for AppError {
    fn from(err: ExtractionError) -> Self {
        let message = err.to_string();
        match err {
            ExtractionError::UnsupportedDocumentType {
                filename,
                media_type,
            } => {
                tracing::debug!("Rejected upload {filename:?} with media type {media_type:?}");
                AppError::UnsupportedDocumentType(message)
            }
            ExtractionError::NoExtractableText => AppError::NoExtractableText(message),
            ExtractionError::MalformedDocument { .. } => AppError::MalformedDocument(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnsupportedDocumentType(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_DOCUMENT_TYPE",
                msg.clone(),
            ),
            AppError::NoExtractableText(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "NO_EXTRACTABLE_TEXT",
                msg.clone(),
            ),
            AppError::MalformedDocument(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "MALFORMED_DOCUMENT",
                msg.clone(),
            ),
            AppError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
