use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::lookup::MedicalDatabaseTool;
use crate::pipeline::structuring::{
    FieldViolation, InstructionTemplate, QuerySpec, StructuredRequest, StructuredResponse, ToolSet,
};

const MEDICAL_QUERY_TEMPLATE: InstructionTemplate = InstructionTemplate::new(
    r#"You are IMED Search AI, an AI medical assistant designed to provide accurate and informative answers to medical questions.
Always provide a professional, helpful, and concise answer.
If the user's question requires detailed medical information that you might not have readily, use the 'searchMedicalDatabase' tool to find relevant information before formulating your answer.
When citing information from the tool, integrate it naturally into your response.
Always emphasize that this information is not a substitute for professional medical advice.

User's medical question: {{{query}}}"#,
);

/// The Q&A query, with the topic lookup tool on offer.
pub fn medical_query() -> QuerySpec {
    QuerySpec::new("medical_query", MEDICAL_QUERY_TEMPLATE)
        .with_tools(ToolSet::new().with(Arc::new(MedicalDatabaseTool)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalQueryRequest {
    pub query: String,
}

impl StructuredRequest for MedicalQueryRequest {
    fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        if self.query.trim().is_empty() {
            return Err(vec![FieldViolation::new("query", "must not be blank")]);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerResult {
    /// Informative answer to the medical question.
    pub answer: String,
}

impl StructuredResponse for AnswerResult {
    fn check(&self) -> Result<(), FieldViolation> {
        if self.answer.trim().is_empty() {
            return Err(FieldViolation::new("answer", "must not be blank"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_rejected() {
        let err = MedicalQueryRequest { query: "".into() }.validate().unwrap_err();
        assert_eq!(err[0].path, "query");
    }

    #[test]
    fn offers_lookup_tool() {
        let defs = medical_query().tools.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "searchMedicalDatabase");
        assert_eq!(defs[0].parameters["required"][0], "topic");
    }
}
