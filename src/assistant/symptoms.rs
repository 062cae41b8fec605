use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::pipeline::structuring::{
    FieldViolation, InstructionTemplate, QuerySpec, StructuredRequest, StructuredResponse,
};

const SYMPTOM_TEMPLATE: InstructionTemplate = InstructionTemplate::new(
    r#"You are a helpful and professional medical assistant.
Your task is to analyze a user's described symptoms and provide:
1. A list of potential medical conditions that could be associated with these symptoms.
2. Clear and appropriate recommendations for next steps.

Symptoms: {{{symptoms}}}

Please provide your response in a JSON object that matches this structure:
{
  "potentialConditions": ["condition1", "condition2"],
  "recommendations": "string"
}"#,
);

pub fn symptom_query() -> QuerySpec {
    QuerySpec::new("symptom_analysis", SYMPTOM_TEMPLATE)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomRequest {
    /// Free-text description of what the user is experiencing.
    pub symptoms: String,
}

impl StructuredRequest for SymptomRequest {
    fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        if self.symptoms.trim().is_empty() {
            return Err(vec![FieldViolation::new("symptoms", "must not be blank")]);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymptomResult {
    /// Potential medical conditions associated with the symptoms.
    pub potential_conditions: Vec<String>,
    /// Recommended next steps, such as consulting a doctor or self-care.
    pub recommendations: String,
}

impl StructuredResponse for SymptomResult {
    fn check(&self) -> Result<(), FieldViolation> {
        if self.potential_conditions.is_empty() {
            return Err(FieldViolation::new("potentialConditions", "must not be empty"));
        }
        if self.recommendations.trim().is_empty() {
            return Err(FieldViolation::new("recommendations", "must not be blank"));
        }
        Ok(())
    }
}
