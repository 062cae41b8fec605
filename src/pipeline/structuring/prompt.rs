use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::types::InlineImage;
use super::QueryError;

/// Text placed where a `{{media field}}` directive attached an image.
pub const ATTACHMENT_MARKER: &str = "[see attached image]";

static IF_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{#if (\w+)\}\}(.*?)\{\{/if\}\}").expect("valid regex"));

static MEDIA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{media (\w+)\}\}").expect("valid regex"));

static FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\{?(\w+)\}?\}\}").expect("valid regex"));

/// A natural-language instruction with placeholders for request fields.
///
/// Supported directives:
/// - `{{field}}` (or `{{{field}}}`) substitutes the field's text
/// - `{{#if field}}...{{/if}}` keeps the block only when the field is present and non-blank
/// - `{{media field}}` attaches the field's data URI as an inline image
///
/// Field values are substituted last and never re-scanned, so user text
/// containing `{{...}}` stays literal.
#[derive(Debug, Clone, Copy)]
pub struct InstructionTemplate {
    source: &'static str,
}

/// A rendered instruction plus the images it attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedInstruction {
    pub text: String,
    pub attachments: Vec<InlineImage>,
}

impl InstructionTemplate {
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    /// Render against the serialized request fields.
    pub fn render(&self, fields: &Map<String, Value>) -> Result<RenderedInstruction, QueryError> {
        let with_blocks = IF_BLOCK.replace_all(self.source, |caps: &Captures| {
            if is_present(fields.get(&caps[1])) {
                caps[2].to_string()
            } else {
                String::new()
            }
        });

        let mut attachments = Vec::new();
        let mut media_error = None;
        let with_media = MEDIA.replace_all(&with_blocks, |caps: &Captures| {
            let name = &caps[1];
            match fields.get(name).and_then(Value::as_str) {
                Some(uri) if !uri.trim().is_empty() => match InlineImage::from_data_uri(uri) {
                    Ok(image) => {
                        attachments.push(image);
                        ATTACHMENT_MARKER.to_string()
                    }
                    Err(reason) => {
                        if media_error.is_none() {
                            media_error = Some(QueryError::invalid(name, reason));
                        }
                        String::new()
                    }
                },
                _ => String::new(),
            }
        });
        if let Some(err) = media_error {
            return Err(err);
        }

        let text = FIELD
            .replace_all(&with_media, |caps: &Captures| field_text(fields.get(&caps[1])))
            .into_owned();

        Ok(RenderedInstruction { text, attachments })
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn substitutes_fields() {
        let template = InstructionTemplate::new("Symptoms: {{{symptoms}}}");
        let rendered = template
            .render(&fields(json!({"symptoms": "fever and cough"})))
            .unwrap();
        assert_eq!(rendered.text, "Symptoms: fever and cough");
        assert!(rendered.attachments.is_empty());
    }

    #[test]
    fn if_block_dropped_for_absent_or_blank_field() {
        let template = InstructionTemplate::new("A{{#if reportText}}\nTEXT: {{reportText}}{{/if}}B");
        let absent = template.render(&fields(json!({}))).unwrap();
        assert_eq!(absent.text, "AB");
        let blank = template.render(&fields(json!({"reportText": "  "}))).unwrap();
        assert_eq!(blank.text, "AB");
        let present = template.render(&fields(json!({"reportText": "Hb 10"}))).unwrap();
        assert_eq!(present.text, "A\nTEXT: Hb 10B");
    }

    #[test]
    fn media_field_becomes_attachment_not_text() {
        let template = InstructionTemplate::new(
            "{{#if photo}}IMAGE: {{media photo}}{{/if}}",
        );
        let uri = "data:image/jpeg;base64,/9j/4AAQ";
        let rendered = template.render(&fields(json!({ "photo": uri }))).unwrap();
        assert_eq!(rendered.text, format!("IMAGE: {ATTACHMENT_MARKER}"));
        assert!(!rendered.text.contains("base64"));
        assert_eq!(rendered.attachments.len(), 1);
        assert_eq!(rendered.attachments[0].mime_type, "image/jpeg");
    }

    #[test]
    fn malformed_media_field_is_invalid_request() {
        let template = InstructionTemplate::new("{{media photo}}");
        let err = template
            .render(&fields(json!({ "photo": "not a data uri" })))
            .unwrap_err();
        match err {
            QueryError::InvalidRequest(violations) => assert_eq!(violations[0].path, "photo"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn user_text_with_braces_is_not_rescanned() {
        let template = InstructionTemplate::new("Q: {{query}}");
        let rendered = template
            .render(&fields(json!({"query": "what is {{#if x}}this{{/if}}?"})))
            .unwrap();
        assert_eq!(rendered.text, "Q: what is {{#if x}}this{{/if}}?");
    }

    #[test]
    fn unknown_field_renders_empty() {
        let template = InstructionTemplate::new("[{{missing}}]");
        let rendered = template.render(&Map::new()).unwrap();
        assert_eq!(rendered.text, "[]");
    }
}
