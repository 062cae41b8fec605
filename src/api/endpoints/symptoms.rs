//! `POST /api/symptoms`: potential conditions and next steps for described symptoms.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::json_body;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::assistant::{SymptomRequest, SymptomResult};

pub async fn analyze(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SymptomRequest>, JsonRejection>,
) -> Result<Json<SymptomResult>, ApiError> {
    let request = json_body(payload)?;
    let result = ctx.assistant.analyze_symptoms(&request).await?;
    Ok(Json(result))
}
