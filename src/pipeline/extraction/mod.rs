pub mod types;
pub mod format;
pub mod pdf;
pub mod docx;
pub mod backend;
pub mod orchestrator;

pub use types::*;
pub use format::*;
pub use pdf::*;
pub use docx::*;
pub use backend::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Unsupported file type '{0}'. Accepted formats: images (image/*), PDF, DOCX")]
    UnsupportedFormat(String),

    #[error("Could not read the document: {0}")]
    CorruptOrUnreadable(String),

    #[error("Document extraction is not ready yet: {0}")]
    ExtractorNotReady(String),

    #[error("File is too large ({size} bytes, limit {limit} bytes)")]
    TooLarge { size: usize, limit: usize },
}

impl NormalizeError {
    /// Only a backend that has not finished loading can succeed on resubmission.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExtractorNotReady(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_not_ready_is_retryable() {
        assert!(NormalizeError::ExtractorNotReady("loading".into()).is_retryable());
        assert!(!NormalizeError::UnsupportedFormat("text/csv".into()).is_retryable());
        assert!(!NormalizeError::CorruptOrUnreadable("bad xref".into()).is_retryable());
        assert!(!NormalizeError::TooLarge { size: 2, limit: 1 }.is_retryable());
    }

    #[test]
    fn unsupported_message_names_accepted_set() {
        let message = NormalizeError::UnsupportedFormat("text/plain".into()).to_string();
        assert!(message.contains("text/plain"));
        assert!(message.contains("PDF"));
        assert!(message.contains("DOCX"));
    }
}
