//! API error types with structured JSON responses.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::assistant::AssistantError;
use crate::pipeline::extraction::NormalizeError;
use crate::pipeline::structuring::{FieldViolation, QueryError};

/// Seconds a client should wait before retrying while extractors load.
const EXTRACTOR_RETRY_AFTER_SECS: u64 = 5;

const PROCESSING_FAILED_MESSAGE: &str =
    "The analysis could not be completed. Please try again.";

const MODEL_UNAVAILABLE_MESSAGE: &str =
    "The AI service is temporarily unavailable. Please try again later.";

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldViolation>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),
}

impl From<NormalizeError> for ApiError {
    fn from(err: NormalizeError) -> Self {
        ApiError::Assistant(err.into())
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Assistant(err.into())
    }
}

struct Mapped {
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
    fields: Vec<FieldViolation>,
}

impl Mapped {
    fn new(status: StatusCode, code: &'static str, message: String, retryable: bool) -> Self {
        Self {
            status,
            code,
            message,
            retryable,
            fields: Vec::new(),
        }
    }
}

fn map_normalize(err: &NormalizeError) -> Mapped {
    let retryable = err.is_retryable();
    let message = err.to_string();
    match err {
        NormalizeError::UnsupportedFormat(_) => Mapped::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "UNSUPPORTED_FORMAT",
            message,
            retryable,
        ),
        NormalizeError::CorruptOrUnreadable(_) => Mapped::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "UNREADABLE_DOCUMENT",
            message,
            retryable,
        ),
        NormalizeError::ExtractorNotReady(detail) => {
            tracing::warn!(detail = %detail, "Extractors not ready for request");
            Mapped::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "EXTRACTOR_NOT_READY",
                "Document processing is still starting up. Please retry shortly.".to_string(),
                retryable,
            )
        }
        NormalizeError::TooLarge { .. } => {
            Mapped::new(StatusCode::PAYLOAD_TOO_LARGE, "TOO_LARGE", message, retryable)
        }
    }
}

fn map_query(err: &QueryError) -> Mapped {
    let retryable = err.is_retryable();
    match err {
        QueryError::InvalidRequest(violations) => Mapped {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_REQUEST",
            message: err.to_string(),
            retryable,
            fields: violations.clone(),
        },
        QueryError::EmptyModelResponse
        | QueryError::SchemaViolation(_)
        | QueryError::ToolLoopExceeded(_) => {
            tracing::warn!(error = %err, "Model output unusable");
            Mapped::new(
                StatusCode::BAD_GATEWAY,
                "PROCESSING_FAILED",
                PROCESSING_FAILED_MESSAGE.to_string(),
                retryable,
            )
        }
        QueryError::ModelUnavailable(_) | QueryError::ModelError { .. } => {
            tracing::warn!(error = %err, "Model provider call failed");
            Mapped::new(
                StatusCode::BAD_GATEWAY,
                "MODEL_UNAVAILABLE",
                MODEL_UNAVAILABLE_MESSAGE.to_string(),
                retryable,
            )
        }
        QueryError::ModelConfig(detail) => {
            tracing::error!(detail = %detail, "Model client misconfigured");
            Mapped::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "An internal error occurred".to_string(),
                retryable,
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mapped = match &self {
            ApiError::Assistant(AssistantError::Normalize(e)) => map_normalize(e),
            ApiError::Assistant(AssistantError::Query(e)) => map_query(e),
            ApiError::BadRequest(detail) => {
                Mapped::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone(), false)
            }
            ApiError::PayloadTooLarge(detail) => {
                Mapped::new(StatusCode::PAYLOAD_TOO_LARGE, "TOO_LARGE", detail.clone(), false)
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: mapped.code,
                message: mapped.message,
                retryable: mapped.retryable,
                fields: mapped.fields,
            },
        };

        let mut response = (mapped.status, Json(body)).into_response();
        if mapped.status == StatusCode::SERVICE_UNAVAILABLE {
            response.headers_mut().insert(
                "Retry-After",
                HeaderValue::from(EXTRACTOR_RETRY_AFTER_SECS),
            );
        }
        response
    }
}
