use async_trait::async_trait;
use base64::Engine;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::validation::FieldViolation;
use super::QueryError;

/// An image forwarded to the model as an inline attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload, without the `data:` prefix.
    pub data: String,
}

impl InlineImage {
    /// Parse a `data:<mime>;base64,<payload>` URI.
    ///
    /// The payload is checked to be valid base64 but never decoded into pixels.
    pub fn from_data_uri(uri: &str) -> Result<Self, String> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| "expected a data URI starting with 'data:'".to_string())?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| "data URI has no ',' separating header and payload".to_string())?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| "data URI must use base64 encoding".to_string())?;
        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err("data URI must declare a MIME type".into());
        }
        if data.is_empty() {
            return Err("data URI payload is empty".into());
        }
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| format!("data URI payload is not valid base64: {e}"))?;

        Ok(Self {
            mime_type: mime_type.to_ascii_lowercase(),
            data: data.to_string(),
        })
    }
}

/// Provider-side content categories that can be blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Safety configuration for medical discussion.
///
/// Anatomy, dosing and symptom vocabulary routinely trips the provider's
/// default filters, so blocking is disabled for every category.
pub fn medical_safety_settings() -> Vec<SafetySetting> {
    [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: HarmBlockThreshold::BlockNone,
    })
    .collect()
}

/// A function the model may call before producing its final answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the call arguments.
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: serde_json::Value,
}

/// A tool invocation together with the text it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExchange {
    pub call: ToolCall,
    pub output: String,
}

/// Everything sent to the model boundary for one call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub instruction: String,
    pub attachments: Vec<InlineImage>,
    /// Inlined JSON schema of the expected output.
    pub output_schema: serde_json::Value,
    pub safety_settings: Vec<SafetySetting>,
    pub tools: Vec<ToolDefinition>,
    /// Tool rounds already completed in this turn, oldest first.
    pub tool_rounds: Vec<Vec<ToolExchange>>,
}

/// What the model produced for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Final textual output (expected to be JSON).
    Text(String),
    /// The model wants these tools run before it answers.
    ToolCalls(Vec<ToolCall>),
    /// No candidate, or a candidate without content.
    Empty,
}

/// Hosted generative model abstraction (allows mocking).
#[async_trait]
pub trait ModelBoundary: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelTurn, QueryError>;

    fn model_name(&self) -> &str;
}

/// Input side of a structured query.
///
/// Serialized field names are what instruction templates refer to.
pub trait StructuredRequest: Serialize + Send + Sync {
    fn validate(&self) -> Result<(), Vec<FieldViolation>>;
}

/// Output side of a structured query.
///
/// The JSON schema derived from the type is both sent to the model and used
/// to validate what comes back.
pub trait StructuredResponse: DeserializeOwned + JsonSchema + Send {
    /// Checks that go beyond shape, run after schema validation passed.
    fn check(&self) -> Result<(), FieldViolation> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_png_data_uri() {
        let image = InlineImage::from_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBORw0KGgo=");
    }

    #[test]
    fn rejects_plain_text_as_data_uri() {
        assert!(InlineImage::from_data_uri("Hemoglobin 10 g/dL").is_err());
    }

    #[test]
    fn rejects_non_base64_data_uri() {
        let err = InlineImage::from_data_uri("data:image/png,rawbytes").unwrap_err();
        assert!(err.contains("base64"));
    }

    #[test]
    fn rejects_corrupt_payload() {
        assert!(InlineImage::from_data_uri("data:image/jpeg;base64,@@@").is_err());
    }

    #[test]
    fn safety_settings_disable_all_four_categories() {
        let settings = medical_safety_settings();
        assert_eq!(settings.len(), 4);
        assert!(settings
            .iter()
            .all(|s| s.threshold == HarmBlockThreshold::BlockNone));

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json[0]["category"], "HARM_CATEGORY_HARASSMENT");
        assert_eq!(json[3]["category"], "HARM_CATEGORY_DANGEROUS_CONTENT");
        assert_eq!(json[0]["threshold"], "BLOCK_NONE");
    }
}
