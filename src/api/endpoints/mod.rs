//! API endpoint handlers, one module per assistant feature.

pub mod blood_report;
pub mod health;
pub mod query;
pub mod symptoms;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;

/// Unwrap a JSON body, turning axum's plain-text rejection into a structured
/// 400, or 413 when the body hit the size limit.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })
}
