//! API router.
//!
//! Returns a composable `Router` with every endpoint under `/api/`.
//!
//! Layers (outermost → innermost): CORS → request log → body limit → handler

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn api_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/symptoms", post(endpoints::symptoms::analyze))
        .route("/blood-report", post(endpoints::blood_report::analyze))
        .route("/blood-report/upload", post(endpoints::blood_report::upload))
        .route("/query", post(endpoints::query::answer))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(middleware::audit::log_request))
        .layer(CorsLayer::permissive())
}
