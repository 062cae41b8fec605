use async_trait::async_trait;
use serde_json::{json, Value};

use super::gemini_types::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, Part, ToolDeclarations,
};
use super::types::{ModelBoundary, ModelRequest, ModelTurn, ToolCall};
use super::QueryError;

/// Public Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Gemini HTTP client for hosted inference.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
    temperature: f32,
}

impl GeminiClient {
    /// Create a client for `model` at `base_url`.
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, QueryError> {
        if api_key.trim().is_empty() {
            return Err(QueryError::ModelConfig("API key is empty".into()));
        }
        if model.trim().is_empty() || model.contains('/') {
            return Err(QueryError::ModelConfig(format!("invalid model name '{model}'")));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| QueryError::ModelConfig(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
            temperature: 0.2,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> QueryError {
        if e.is_timeout() {
            QueryError::ModelUnavailable(format!(
                "request timed out after {}s",
                self.timeout_secs
            ))
        } else if e.is_connect() {
            QueryError::ModelUnavailable(format!("cannot connect to {}", self.base_url))
        } else {
            QueryError::ModelUnavailable(e.to_string())
        }
    }
}

#[async_trait]
impl ModelBoundary for GeminiClient {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelTurn, QueryError> {
        let body = build_request(request, self.temperature);

        tracing::debug!(
            model = %self.model,
            attachments = request.attachments.len(),
            tools = request.tools.len(),
            tool_rounds = request.tool_rounds.len(),
            "Calling Gemini generateContent"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::ModelError {
                status: status.as_u16(),
                message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| QueryError::ModelError {
                status: status.as_u16(),
                message: format!("undecodable response envelope: {e}"),
            })?;

        Ok(interpret_response(parsed))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Build the provider request body for one model call.
///
/// With tools on offer the provider cannot also enforce a response schema,
/// so the schema is stated in the instruction instead.
pub fn build_request(request: &ModelRequest, temperature: f32) -> GenerateContentRequest {
    let provider_schema = to_provider_schema(&request.output_schema);

    let mut instruction = request.instruction.clone();
    let generation_config = if request.tools.is_empty() {
        GenerationConfig {
            temperature,
            response_mime_type: Some("application/json".into()),
            response_schema: Some(provider_schema),
        }
    } else {
        instruction.push_str(
            "\n\nWhen you are ready to answer, reply with a single JSON object matching this JSON schema:\n",
        );
        instruction.push_str(&request.output_schema.to_string());
        GenerationConfig {
            temperature,
            response_mime_type: None,
            response_schema: None,
        }
    };

    let mut first_parts = vec![Part::text(instruction)];
    first_parts.extend(
        request
            .attachments
            .iter()
            .map(|image| Part::inline(&image.mime_type, &image.data)),
    );

    let mut contents = vec![Content::user(first_parts)];
    for round in &request.tool_rounds {
        contents.push(Content::model(
            round
                .iter()
                .map(|exchange| Part {
                    function_call: Some(FunctionCall {
                        name: exchange.call.name.clone(),
                        args: exchange.call.args.clone(),
                    }),
                    ..Part::default()
                })
                .collect(),
        ));
        contents.push(Content::user(
            round
                .iter()
                .map(|exchange| Part {
                    function_response: Some(FunctionResponse {
                        name: exchange.call.name.clone(),
                        response: json!({ "result": exchange.output }),
                    }),
                    ..Part::default()
                })
                .collect(),
        ));
    }

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolDeclarations {
            function_declarations: request
                .tools
                .iter()
                .map(|tool| FunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: to_provider_schema(&tool.parameters),
                })
                .collect(),
        }]
    };

    GenerateContentRequest {
        contents,
        safety_settings: request.safety_settings.clone(),
        tools,
        generation_config,
    }
}

/// Reduce the provider envelope to a model turn.
pub fn interpret_response(response: GenerateContentResponse) -> ModelTurn {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        tracing::warn!(block_reason = reason, "Provider blocked the prompt");
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return ModelTurn::Empty;
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" && reason != "MAX_TOKENS" {
            tracing::warn!(finish_reason = reason, "Model finished abnormally");
        }
    }

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let calls: Vec<ToolCall> = parts
        .iter()
        .filter_map(|part| part.function_call.as_ref())
        .map(|call| ToolCall {
            name: call.name.clone(),
            args: call.args.clone(),
        })
        .collect();
    if !calls.is_empty() {
        return ModelTurn::ToolCalls(calls);
    }

    let text: String = parts.iter().filter_map(|part| part.text.as_deref()).collect();
    if text.trim().is_empty() {
        ModelTurn::Empty
    } else {
        ModelTurn::Text(text)
    }
}

/// Convert a JSON schema to the provider's OpenAPI dialect.
///
/// Type names are upper-cased and a `["T", "null"]` type pair becomes
/// `type: T, nullable: true`.
pub fn to_provider_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("type", Value::String(name)) => {
                        out.insert(key.clone(), Value::String(name.to_ascii_uppercase()));
                    }
                    ("type", Value::Array(names)) => {
                        let concrete: Vec<&str> = names
                            .iter()
                            .filter_map(Value::as_str)
                            .filter(|n| *n != "null")
                            .collect();
                        if let Some(first) = concrete.first() {
                            out.insert(key.clone(), Value::String(first.to_ascii_uppercase()));
                        }
                        if concrete.len() < names.len() {
                            out.insert("nullable".into(), Value::Bool(true));
                        }
                    }
                    ("properties", Value::Object(props)) => {
                        out.insert(
                            key.clone(),
                            Value::Object(
                                props
                                    .iter()
                                    .map(|(name, s)| (name.clone(), to_provider_schema(s)))
                                    .collect(),
                            ),
                        );
                    }
                    _ => {
                        out.insert(key.clone(), to_provider_schema(value));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(to_provider_schema).collect()),
        other => other.clone(),
    }
}
