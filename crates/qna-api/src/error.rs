//! API error handling
//!
//! Author: hephaex@gmail.com

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use qna_core::QnaError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    #[schema(example = "BAD_REQUEST")]
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    PayloadTooLarge(String),
    DocumentLoad(String),
    Embedding(String),
    ModelInvocation(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::DocumentLoad(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Embedding(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ModelInvocation(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::BadRequest(msg) => ApiError::bad_request(msg),
            AppError::PayloadTooLarge(msg) => ApiError::new("PAYLOAD_TOO_LARGE", msg),
            AppError::DocumentLoad(msg) => {
                ApiError::new("DOCUMENT_LOAD_ERROR", "Document could not be loaded").with_details(msg)
            }
            AppError::Embedding(msg) => {
                ApiError::new("EMBEDDING_ERROR", "Document could not be indexed").with_details(msg)
            }
            AppError::ModelInvocation(msg) => {
                ApiError::new("MODEL_ERROR", "Language model call failed").with_details(msg)
            }
            AppError::Internal(msg) => ApiError::internal_error().with_details(msg),
        };

        if status.is_server_error() {
            tracing::error!(code = %error.code, details = ?error.details, "Request failed");
        } else {
            tracing::warn!(code = %error.code, message = %error.message, "Request rejected");
        }

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("Upload storage failed: {err}"))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(err.body_text());
        }
        AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

impl From<QnaError> for AppError {
    fn from(err: QnaError) -> Self {
        match err {
            QnaError::Validation(msg) | QnaError::MalformedRequest(msg) => AppError::BadRequest(msg),
            QnaError::DocumentLoad(msg) => AppError::DocumentLoad(msg),
            QnaError::Embedding(msg) => AppError::Embedding(msg),
            QnaError::ModelInvocation(msg) => AppError::ModelInvocation(msg),
            QnaError::Config(msg) => AppError::Internal(format!("Configuration error: {msg}")),
            QnaError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (QnaError::Validation("q".into()), StatusCode::BAD_REQUEST),
            (QnaError::MalformedRequest("m".into()), StatusCode::BAD_REQUEST),
            (QnaError::DocumentLoad("d".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (QnaError::Embedding("e".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (QnaError::ModelInvocation("m".into()), StatusCode::BAD_GATEWAY),
            (QnaError::Config("c".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_api_error_omits_empty_details() {
        let json = serde_json::to_value(ApiError::bad_request("nope")).unwrap();
        assert_eq!(json["code"], "BAD_REQUEST");
        assert!(json.get("details").is_none());

        let json = serde_json::to_value(ApiError::internal_error().with_details("boom")).unwrap();
        assert_eq!(json["details"], "boom");
    }
}
