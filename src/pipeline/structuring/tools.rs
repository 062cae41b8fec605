use std::sync::Arc;

use serde_json::Value;

use super::types::{ToolCall, ToolDefinition, ToolExchange};

/// A caller-supplied function the model may invoke during a turn.
///
/// Tools are synchronous and infallible from the model's point of view:
/// problems are reported back to the model as text.
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    fn call(&self, args: &Value) -> String;
}

/// The tools offered for one query.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run every call of one model round, in the order requested.
    pub fn run_round(&self, calls: Vec<ToolCall>) -> Vec<ToolExchange> {
        calls
            .into_iter()
            .map(|call| {
                let output = match self.tools.iter().find(|t| t.definition().name == call.name) {
                    Some(tool) => {
                        tracing::debug!(tool = %call.name, "Running model-requested tool");
                        tool.call(&call.args)
                    }
                    None => {
                        tracing::warn!(tool = %call.name, "Model requested an unknown tool");
                        format!("Error: no tool named '{}' is available.", call.name)
                    }
                };
                ToolExchange { call, output }
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.definition().name))
            .finish()
    }
}
