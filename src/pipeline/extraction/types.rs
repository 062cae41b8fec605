use serde::{Deserialize, Serialize};

use super::NormalizeError;

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Declared MIME type; may be empty or generic.
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
}

impl UploadedDocument {
    pub fn new(mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            bytes,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }
}

/// Model-ready form of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NormalizedInput {
    Image {
        #[serde(rename = "dataUri")]
        data_uri: String,
    },
    Text { content: String },
}

impl NormalizedInput {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::Text { .. } => "text",
        }
    }
}

/// Recognized document category
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Image { mime_type: String },
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// Text layer reader for PDFs (allows mocking).
///
/// Returns the text items of every page, pages in document order.
pub trait PdfTextLayer: Send + Sync {
    fn page_items(&self, pdf_bytes: &[u8]) -> Result<Vec<Vec<String>>, NormalizeError>;
}

/// Raw body text reader for DOCX files (allows mocking).
pub trait DocxTextReader: Send + Sync {
    fn raw_text(&self, docx_bytes: &[u8]) -> Result<String, NormalizeError>;
}

/// Join per-page items: items separated by one space, every page ends with `\n`.
pub fn join_page_items(pages: &[Vec<String>]) -> String {
    pages.iter().fold(String::new(), |mut out, items| {
        out.push_str(&items.join(" "));
        out.push('\n');
        out
    })
}
