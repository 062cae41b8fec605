use super::types::{DocumentKind, UploadedDocument};
use super::NormalizeError;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Decide how an upload will be normalized.
///
/// The declared MIME type wins. Only an empty or `application/octet-stream`
/// declaration falls back to magic bytes and then the file extension.
pub fn classify(doc: &UploadedDocument) -> Result<DocumentKind, NormalizeError> {
    let mime = declared_mime(&doc.mime_type);

    if mime.starts_with("image/") {
        return Ok(DocumentKind::Image { mime_type: mime });
    }
    if mime == PDF_MIME {
        return Ok(DocumentKind::Pdf);
    }
    if mime == DOCX_MIME || has_docx_name(doc.file_name.as_deref()) {
        return Ok(DocumentKind::Docx);
    }
    if mime.is_empty() || mime == "application/octet-stream" {
        if let Some(kind) = sniff(&doc.bytes, doc.file_name.as_deref()) {
            tracing::debug!(kind = kind.as_str(), "Document type detected from content");
            return Ok(kind);
        }
    }

    let shown = if mime.is_empty() { "unknown".to_string() } else { mime };
    Err(NormalizeError::UnsupportedFormat(shown))
}

/// Lower-cased MIME type without parameters.
fn declared_mime(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn has_docx_name(name: Option<&str>) -> bool {
    name.is_some_and(|n| n.trim().to_ascii_lowercase().ends_with(".docx"))
}

fn sniff(bytes: &[u8], file_name: Option<&str>) -> Option<DocumentKind> {
    let image = |mime: &str| {
        Some(DocumentKind::Image {
            mime_type: mime.to_string(),
        })
    };

    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some(DocumentKind::Pdf),
        [0xFF, 0xD8, 0xFF, ..] => image("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => image("image/png"),
        // GIF87a / GIF89a
        [0x47, 0x49, 0x46, 0x38, ..] => image("image/gif"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => image("image/webp"),
        _ => guess_from_name(file_name?),
    }
}

fn guess_from_name(name: &str) -> Option<DocumentKind> {
    let guess = mime_guess::from_path(name).first()?;
    if guess.type_() == mime_guess::mime::IMAGE {
        Some(DocumentKind::Image {
            mime_type: guess.essence_str().to_string(),
        })
    } else if guess.essence_str() == PDF_MIME {
        Some(DocumentKind::Pdf)
    } else {
        None
    }
}
