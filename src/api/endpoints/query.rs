//! `POST /api/query`: open medical question answering.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::json_body;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::assistant::{AnswerResult, MedicalQueryRequest};

pub async fn answer(
    State(ctx): State<ApiContext>,
    payload: Result<Json<MedicalQueryRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>, ApiError> {
    let request = json_body(payload)?;
    let result = ctx.assistant.answer_medical_query(&request).await?;
    Ok(Json(result))
}
