pub mod types;
pub mod prompt;
pub mod parser;
pub mod validation;
pub mod tools;
pub mod gemini_types;
pub mod gemini;
pub mod orchestrator;
#[cfg(test)]
pub mod mock;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use validation::*;
pub use tools::*;
pub use gemini::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid request: {}", join_violations(.0))]
    InvalidRequest(Vec<FieldViolation>),

    #[error("The AI model returned no results")]
    EmptyModelResponse,

    #[error("Model response failed schema validation at {0}")]
    SchemaViolation(FieldViolation),

    #[error("Model kept calling tools after {0} rounds without answering")]
    ToolLoopExceeded(usize),

    #[error("Model provider is unreachable: {0}")]
    ModelUnavailable(String),

    #[error("Model provider returned an error (HTTP {status}): {message}")]
    ModelError { status: u16, message: String },

    #[error("Model client configuration error: {0}")]
    ModelConfig(String),
}

impl QueryError {
    /// Whether resubmitting the same request can succeed.
    ///
    /// Nothing is written on the way to the model, so every failure that
    /// originates on the model side is safe to resubmit.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidRequest(_) | Self::ModelConfig(_) => false,
            Self::ModelError { status, .. } => *status == 429 || *status >= 500,
            Self::EmptyModelResponse
            | Self::SchemaViolation(_)
            | Self::ToolLoopExceeded(_)
            | Self::ModelUnavailable(_) => true,
        }
    }

    /// Shorthand for a single-field request violation.
    pub fn invalid(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRequest(vec![FieldViolation::new(path, reason)])
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
