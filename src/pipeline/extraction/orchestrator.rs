use std::sync::Arc;

use base64::Engine;

use super::backend::LazyExtractors;
use super::format::classify;
use super::types::{join_page_items, DocumentKind, NormalizedInput, UploadedDocument};
use super::NormalizeError;

/// Largest upload accepted by default (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Turns uploads into model-ready input.
/// Images pass through as data URIs; PDF and DOCX are reduced to plain text.
pub struct DocumentNormalizer {
    extractors: Arc<LazyExtractors>,
    max_bytes: usize,
}

impl DocumentNormalizer {
    pub fn new(extractors: Arc<LazyExtractors>) -> Self {
        Self {
            extractors,
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn extractors(&self) -> &Arc<LazyExtractors> {
        &self.extractors
    }

    pub async fn normalize(&self, doc: UploadedDocument) -> Result<NormalizedInput, NormalizeError> {
        let size = doc.bytes.len();
        if size > self.max_bytes {
            return Err(NormalizeError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        let kind = classify(&doc)?;
        tracing::info!(kind = kind.as_str(), size_bytes = size, "Normalizing document");

        if size == 0 {
            return Err(NormalizeError::CorruptOrUnreadable("file is empty".into()));
        }

        let text = match kind {
            DocumentKind::Image { mime_type } => {
                let payload = base64::engine::general_purpose::STANDARD.encode(&doc.bytes);
                return Ok(NormalizedInput::Image {
                    data_uri: format!("data:{mime_type};base64,{payload}"),
                });
            }
            DocumentKind::Pdf => {
                let pdf = Arc::clone(&self.extractors.get().await?.pdf);
                run_blocking(move || {
                    pdf.page_items(&doc.bytes)
                        .map(|pages| join_page_items(&pages))
                })
                .await?
            }
            DocumentKind::Docx => {
                let docx = Arc::clone(&self.extractors.get().await?.docx);
                run_blocking(move || docx.raw_text(&doc.bytes)).await?
            }
        };

        if text.trim().is_empty() {
            tracing::warn!(size_bytes = size, "Document has no extractable text");
            return Err(NormalizeError::CorruptOrUnreadable(
                "no extractable text".into(),
            ));
        }

        tracing::info!(chars = text.chars().count(), "Document text extracted");
        Ok(NormalizedInput::Text { content: text })
    }
}

/// Run CPU-bound parsing off the async workers.
async fn run_blocking<F>(f: F) -> Result<String, NormalizeError>
where
    F: FnOnce() -> Result<String, NormalizeError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "Extraction task panicked");
        NormalizeError::CorruptOrUnreadable("document parser crashed".into())
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::docx::make_test_docx;
    use crate::pipeline::extraction::format::{DOCX_MIME, PDF_MIME};
    use crate::pipeline::extraction::pdf::make_test_pdf;
    use std::time::Duration;

    fn normalizer() -> DocumentNormalizer {
        DocumentNormalizer::new(Arc::new(LazyExtractors::builtin(Duration::from_secs(5))))
    }

    #[tokio::test]
    async fn image_becomes_data_uri() {
        let doc = UploadedDocument::new("image/png", vec![0x89, 0x50, 0x4E, 0x47]);
        let input = normalizer().normalize(doc).await.unwrap();
        assert_eq!(
            input,
            NormalizedInput::Image {
                data_uri: "data:image/png;base64,iVBORw==".into()
            }
        );
    }

    #[tokio::test]
    async fn image_does_not_need_backends() {
        let normalizer = normalizer();
        let doc = UploadedDocument::new("image/jpeg", vec![0xFF, 0xD8, 0xFF]);
        normalizer.normalize(doc).await.unwrap();
        assert!(!normalizer.extractors().is_ready());
    }

    #[tokio::test]
    async fn pdf_pages_become_text() {
        let doc = UploadedDocument::new(PDF_MIME, make_test_pdf(&[&["Hello", "World"], &["Foo"]]));
        let input = normalizer().normalize(doc).await.unwrap();
        assert_eq!(
            input,
            NormalizedInput::Text {
                content: "Hello World\nFoo\n".into()
            }
        );
    }

    #[tokio::test]
    async fn docx_by_name_becomes_text() {
        let bytes = make_test_docx("<w:p><w:r><w:t>Hemoglobin 10 g/dL (13-17)</w:t></w:r></w:p>");
        let doc = UploadedDocument::new("application/octet-stream", bytes).with_file_name("labs.docx");
        let input = normalizer().normalize(doc).await.unwrap();
        assert_eq!(
            input,
            NormalizedInput::Text {
                content: "Hemoglobin 10 g/dL (13-17)\n\n".into()
            }
        );
    }

    #[tokio::test]
    async fn textless_pdf_is_unreadable() {
        let doc = UploadedDocument::new(PDF_MIME, make_test_pdf(&[&[]]));
        let err = normalizer().normalize(doc).await.unwrap_err();
        assert!(matches!(err, NormalizeError::CorruptOrUnreadable(ref m) if m == "no extractable text"));
    }

    #[tokio::test]
    async fn corrupt_docx_is_unreadable() {
        let doc = UploadedDocument::new(DOCX_MIME, b"not a zip".to_vec());
        let err = normalizer().normalize(doc).await.unwrap_err();
        assert!(matches!(err, NormalizeError::CorruptOrUnreadable(_)));
    }

    #[tokio::test]
    async fn unsupported_type_rejected() {
        let doc = UploadedDocument::new("text/csv", b"a,b".to_vec());
        let err = normalizer().normalize(doc).await.unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn oversized_upload_rejected_before_parsing() {
        let normalizer = normalizer().with_max_bytes(4);
        let doc = UploadedDocument::new(PDF_MIME, b"%PDF-1.4".to_vec());
        let err = normalizer.normalize(doc).await.unwrap_err();
        assert!(matches!(err, NormalizeError::TooLarge { size: 8, limit: 4 }));
        assert!(!normalizer.extractors().is_ready());
    }

    #[tokio::test]
    async fn empty_file_is_unreadable() {
        let doc = UploadedDocument::new("image/png", Vec::new());
        let err = normalizer().normalize(doc).await.unwrap_err();
        assert!(matches!(err, NormalizeError::CorruptOrUnreadable(_)));
    }
}
