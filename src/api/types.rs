//! Shared state for the HTTP layer.

use std::sync::Arc;

use crate::assistant::MedicalAssistant;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub assistant: Arc<MedicalAssistant>,
    /// Largest accepted upload; the request body limit adds multipart overhead on top.
    pub max_upload_bytes: usize,
}

impl ApiContext {
    pub fn new(assistant: Arc<MedicalAssistant>, max_upload_bytes: usize) -> Self {
        Self {
            assistant,
            max_upload_bytes,
        }
    }
}
