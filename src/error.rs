//! Error taxonomy shared by the generation pipeline, the document store and
//! the HTTP surface.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn validation_failed(message: &str) -> Self {
        Self::new("ValidationFailed", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

/// Errors that can occur while generating, storing or serving documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("cannot generate file for a not existing template {0}")]
    TemplateNotFound(String),
    #[error("render failed: {0}")]
    RenderFailed(String),
    #[error("storage failed: {0}")]
    StorageFailed(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

impl DocumentError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    pub fn storage(message: impl std::fmt::Display) -> Self {
        Self::StorageFailed(message.to_string())
    }

    pub fn render(message: impl std::fmt::Display) -> Self {
        Self::RenderFailed(message.to_string())
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::TemplateNotFound(_) => "NotFound",
            Self::ValidationFailed(_) => "ValidationFailed",
            Self::PayloadTooLarge(_) => "PayloadTooLarge",
            Self::RenderFailed(_) => "RenderFailed",
            Self::StorageFailed(_) => "StorageFailed",
            Self::Database(_) | Self::Config(_) => "InternalServerError",
        }
    }
}

impl ResponseError for DocumentError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal details stay in the logs.
        let message = match self {
            Self::Database(_) | Self::Config(_) => "Internal server error".to_string(),
            Self::RenderFailed(_) => "Failed to generate document".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.kind(), &message))
    }
}

pub type Result<T> = std::result::Result<T, DocumentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DocumentError::not_found("tenant t1").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DocumentError::TemplateNotFound("rentcall".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DocumentError::validation("invalid folder").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            DocumentError::PayloadTooLarge("upload".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            DocumentError::render("chrome exited").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_render_failure_is_generic_for_clients() {
        let response = DocumentError::render("chrome crashed at /tmp/x").error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_response_creation() {
        let err = ErrorResponse::not_found("Document not found");
        assert_eq!(err.error, "NotFound");
        assert_eq!(err.message, "Document not found");

        let err = ErrorResponse::validation_failed("file not supported");
        assert_eq!(err.error, "ValidationFailed");
    }
}
