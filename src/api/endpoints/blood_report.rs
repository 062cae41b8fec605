//! Blood report endpoints.
//!
//! `POST /api/blood-report`: JSON body with `reportPhotoDataUri` and/or `reportText`.
//! `POST /api/blood-report/upload`: multipart upload (field `file`: image, PDF or DOCX).
//!
//! Both accept `?format=markdown` for the printable report instead of JSON.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::json_body;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::assistant::{BloodReportRequest, BloodReportResult};
use crate::pipeline::extraction::UploadedDocument;

const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub format: Option<String>,
}

enum ReportFormat {
    Json,
    Markdown,
}

impl ReportQuery {
    fn report_format(&self) -> Result<ReportFormat, ApiError> {
        match self.format.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("json") => Ok(ReportFormat::Json),
            Some("markdown") | Some("md") => Ok(ReportFormat::Markdown),
            Some(other) => Err(ApiError::BadRequest(format!(
                "Unknown format '{other}'. Use 'json' or 'markdown'"
            ))),
        }
    }
}

fn respond(result: BloodReportResult, format: ReportFormat) -> Response {
    match format {
        ReportFormat::Json => Json(result).into_response(),
        ReportFormat::Markdown => {
            let today = chrono::Local::now().date_naive();
            (
                [(CONTENT_TYPE, "text/markdown; charset=utf-8")],
                result.to_markdown(today),
            )
                .into_response()
        }
    }
}

pub async fn analyze(
    State(ctx): State<ApiContext>,
    Query(query): Query<ReportQuery>,
    payload: Result<Json<BloodReportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let format = query.report_format()?;
    let request = json_body(payload)?;
    let result = ctx.assistant.analyze_blood_report(&request).await?;
    Ok(respond(result, format))
}

pub async fn upload(
    State(ctx): State<ApiContext>,
    Query(query): Query<ReportQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let format = query.report_format()?;
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = ctx.max_upload_bytes;

    let document = read_upload(&mut multipart, limit).await?.ok_or_else(|| {
        ApiError::BadRequest(format!("Multipart field '{UPLOAD_FIELD}' is required"))
    })?;

    tracing::info!(
        size_bytes = document.bytes.len(),
        declared_type = %document.mime_type,
        "Blood report upload received"
    );

    let result = ctx.assistant.analyze_blood_report_upload(document).await?;
    Ok(respond(result, format))
}

async fn read_upload(
    multipart: &mut Multipart,
    limit: usize,
) -> Result<Option<UploadedDocument>, ApiError> {
    let field_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(format!("Uploads are limited to {limit} bytes"))
        } else {
            ApiError::BadRequest(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(field_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let mime_type = field.content_type().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(field_error)?;
        return Ok(Some(UploadedDocument {
            mime_type,
            bytes: bytes.to_vec(),
            file_name,
        }));
    }
    Ok(None)
}
