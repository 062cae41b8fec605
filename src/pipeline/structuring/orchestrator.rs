use std::sync::Arc;

use serde_json::Value;

use super::parser::parse_model_json;
use super::prompt::InstructionTemplate;
use super::tools::ToolSet;
use super::types::{
    medical_safety_settings, ModelBoundary, ModelRequest, ModelTurn, SafetySetting,
    StructuredRequest, StructuredResponse,
};
use super::validation::{response_schema, validate_against_schema, FieldViolation};
use super::QueryError;

/// Tool rounds allowed before a turn is abandoned.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

/// Static description of one kind of structured query.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    /// Short name used in logs.
    pub name: &'static str,
    pub template: InstructionTemplate,
    pub tools: ToolSet,
}

impl QuerySpec {
    pub fn new(name: &'static str, template: InstructionTemplate) -> Self {
        Self {
            name,
            template,
            tools: ToolSet::new(),
        }
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }
}

/// Runs structured queries against the hosted model:
/// validate → render → model (→ tools → model)* → parse → schema check → typed result
///
/// A failed call is never retried here; the error says whether resubmitting
/// can help.
pub struct StructuredExecutor {
    model: Arc<dyn ModelBoundary>,
    safety_settings: Vec<SafetySetting>,
    max_tool_rounds: usize,
}

impl StructuredExecutor {
    pub fn new(model: Arc<dyn ModelBoundary>) -> Self {
        Self {
            model,
            safety_settings: medical_safety_settings(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub async fn execute<Req, Res>(&self, spec: &QuerySpec, payload: &Req) -> Result<Res, QueryError>
    where
        Req: StructuredRequest,
        Res: StructuredResponse,
    {
        payload.validate().map_err(QueryError::InvalidRequest)?;

        let fields = match serde_json::to_value(payload) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => return Err(QueryError::invalid("", "request must be a JSON object")),
            Err(e) => return Err(QueryError::invalid("", e.to_string())),
        };

        let rendered = spec.template.render(&fields)?;
        let schema = response_schema::<Res>();

        let mut request = ModelRequest {
            instruction: rendered.text,
            attachments: rendered.attachments,
            output_schema: schema.clone(),
            safety_settings: self.safety_settings.clone(),
            tools: spec.tools.definitions(),
            tool_rounds: Vec::new(),
        };

        tracing::info!(
            query = spec.name,
            model = %self.model.model_name(),
            attachments = request.attachments.len(),
            tools = request.tools.len(),
            "Running structured query"
        );

        let text = loop {
            match self.model.generate(&request).await? {
                ModelTurn::Text(text) => break text,
                ModelTurn::Empty => {
                    tracing::warn!(query = spec.name, "Model returned no candidates");
                    return Err(QueryError::EmptyModelResponse);
                }
                ModelTurn::ToolCalls(calls) => {
                    if request.tool_rounds.len() >= self.max_tool_rounds {
                        tracing::warn!(
                            query = spec.name,
                            rounds = request.tool_rounds.len(),
                            "Model did not answer within the tool round limit"
                        );
                        return Err(QueryError::ToolLoopExceeded(self.max_tool_rounds));
                    }
                    tracing::debug!(
                        query = spec.name,
                        round = request.tool_rounds.len() + 1,
                        calls = calls.len(),
                        "Model requested tools"
                    );
                    let round = spec.tools.run_round(calls);
                    request.tool_rounds.push(round);
                }
            }
        };

        let value = parse_model_json(&text)?;
        validate_against_schema(&schema, &value).map_err(|violation| {
            tracing::warn!(query = spec.name, path = %violation.path, "Model output violates schema");
            QueryError::SchemaViolation(violation)
        })?;

        let result: Res = serde_json::from_value(value)
            .map_err(|e| QueryError::SchemaViolation(FieldViolation::new("", e.to_string())))?;
        result.check().map_err(QueryError::SchemaViolation)?;

        tracing::info!(
            query = spec.name,
            tool_rounds = request.tool_rounds.len(),
            "Structured query complete"
        );

        Ok(result)
    }
}
