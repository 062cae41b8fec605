use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::types::DocxTextReader;
use super::NormalizeError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Runs, tabs, breaks and paragraph ends of WordprocessingML, in document order.
static BODY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<w:t(?:\s[^>/]*)?>(.*?)</w:t>|<w:tab/>|<w:(?:br|cr)(?:\s[^>]*)?/>|</w:p>|<w:p(?:\s[^>]*)?/>"#,
    )
    .expect("valid regex")
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|lt|gt|amp|quot|apos);").expect("valid regex")
});

/// DOCX raw text reader: unzips the main document part and walks its runs.
pub struct ZipDocxReader;

impl ZipDocxReader {
    /// Compile the body patterns up front so the first upload does not pay for it.
    pub fn new() -> Self {
        LazyLock::force(&BODY_TOKEN);
        LazyLock::force(&ENTITY);
        Self
    }
}

impl Default for ZipDocxReader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocxTextReader for ZipDocxReader {
    fn raw_text(&self, docx_bytes: &[u8]) -> Result<String, NormalizeError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(docx_bytes)).map_err(|e| {
            NormalizeError::CorruptOrUnreadable(format!("not a DOCX archive: {e}"))
        })?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|_| {
                NormalizeError::CorruptOrUnreadable(format!("DOCX archive has no {DOCUMENT_PART}"))
            })?
            .read_to_string(&mut xml)
            .map_err(|e| {
                NormalizeError::CorruptOrUnreadable(format!("DOCX body unreadable: {e}"))
            })?;

        Ok(document_xml_to_text(&xml))
    }
}

/// Paragraphs end with a blank line, `<w:tab/>` becomes `\t`, breaks become `\n`.
pub fn document_xml_to_text(xml: &str) -> String {
    let mut out = String::new();
    for caps in BODY_TOKEN.captures_iter(xml) {
        if let Some(text) = caps.get(1) {
            out.push_str(&decode_entities(text.as_str()));
            continue;
        }
        match &caps[0] {
            "<w:tab/>" => out.push('\t'),
            token if token.starts_with("<w:br") || token.starts_with("<w:cr") => out.push('\n'),
            _ => out.push_str("\n\n"),
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| match &caps[1] {
            "lt" => "<".to_string(),
            "gt" => ">".to_string(),
            "amp" => "&".to_string(),
            "quot" => "\"".to_string(),
            "apos" => "'".to_string(),
            numeric => {
                let code = match numeric.strip_prefix("#x") {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => numeric[1..].parse().ok(),
                };
                code.and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string())
            }
        })
        .into_owned()
}

/// Wrap `body` (the inside of `<w:body>`) in a minimal DOCX archive.
#[cfg(test)]
pub(crate) fn make_test_docx(body: &str) -> Vec<u8> {
    use std::io::Write;

    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(br#"<?xml version="1.0"?><Types/>"#).unwrap();
    writer.start_file(DOCUMENT_PART, options).unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_end_with_blank_line() {
        let docx = make_test_docx(
            "<w:p><w:r><w:t>Hemoglobin 10 g/dL</w:t></w:r></w:p><w:p><w:r><w:t>Glucose 90</w:t></w:r></w:p>",
        );
        let text = ZipDocxReader::new().raw_text(&docx).unwrap();
        assert_eq!(text, "Hemoglobin 10 g/dL\n\nGlucose 90\n\n");
    }

    #[test]
    fn runs_tabs_and_breaks() {
        let xml = r#"<w:p><w:r><w:t xml:space="preserve">WBC </w:t></w:r><w:r><w:tab/><w:t>7.2</w:t><w:br/><w:t>x10^9/L</w:t></w:r></w:p>"#;
        assert_eq!(document_xml_to_text(xml), "WBC \t7.2\nx10^9/L\n\n");
    }

    #[test]
    fn tab_stop_definitions_are_not_tabs() {
        let xml = r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>A</w:t></w:r></w:p>"#;
        assert_eq!(document_xml_to_text(xml), "A\n\n");
    }

    #[test]
    fn entities_decoded() {
        let xml = "<w:p><w:r><w:t>LDL &lt; 100 &amp; HDL &gt; 40 &#x2191;&#8595;</w:t></w:r></w:p>";
        assert_eq!(document_xml_to_text(xml), "LDL < 100 & HDL > 40 ↑↓\n\n");
    }

    #[test]
    fn empty_paragraph_counts() {
        assert_eq!(document_xml_to_text("<w:p/><w:p><w:r><w:t>x</w:t></w:r></w:p>"), "\n\nx\n\n");
    }

    #[test]
    fn non_zip_is_unreadable() {
        let err = ZipDocxReader::new().raw_text(b"plain text").unwrap_err();
        assert!(matches!(err, NormalizeError::CorruptOrUnreadable(_)));
    }

    #[test]
    fn zip_without_body_is_unreadable() {
        use std::io::Write;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hi").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = ZipDocxReader::new().raw_text(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
