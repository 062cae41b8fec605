use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::pipeline::extraction::NormalizedInput;
use crate::pipeline::structuring::{
    FieldViolation, InlineImage, InstructionTemplate, QuerySpec, StructuredRequest,
    StructuredResponse,
};

const BLOOD_REPORT_TEMPLATE: InstructionTemplate = InstructionTemplate::new(
    r#"You are an expert clinical pathologist and medical assistant.
Analyze the provided blood test report data and provide a detailed interpretation.
{{#if reportPhotoDataUri}}
REPORT IMAGE PROVIDED: {{media reportPhotoDataUri}}
{{/if}}{{#if reportText}}
REPORT TEXT CONTENT:
{{{reportText}}}
{{/if}}
Please perform the following:
1. Extract every lab parameter mentioned.
2. For each parameter, determine the status: "low", "normal", or "high" based on the provided reference ranges.
3. Provide a brief summary of the most significant findings.
4. Give a detailed explanation of what the results mean collectively (e.g., signs of anemia, infection, metabolic issues).
5. Suggest appropriate next steps, emphasizing consultation with a primary care physician.

IMPORTANT:
- Always include units.
- If a reference range is missing, use standard clinical ranges but note it.
- Ensure the JSON output matches the requested schema exactly.
- Status values MUST be lowercase: "low", "normal", or "high"."#,
);

pub fn blood_report_query() -> QuerySpec {
    QuerySpec::new("blood_report_analysis", BLOOD_REPORT_TEMPLATE)
}

/// A lab report given as a photo, as text, or both.
///
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodReportRequest {
    /// `data:<mime>;base64,<payload>` photo of the report.
    #[serde(default, skip_serializing_if = "is_blank")]
    pub report_photo_data_uri: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub report_text: Option<String>,
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

impl BloodReportRequest {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            report_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn from_photo(data_uri: impl Into<String>) -> Self {
        Self {
            report_photo_data_uri: Some(data_uri.into()),
            ..Self::default()
        }
    }
}

impl From<NormalizedInput> for BloodReportRequest {
    fn from(input: NormalizedInput) -> Self {
        match input {
            NormalizedInput::Image { data_uri } => Self::from_photo(data_uri),
            NormalizedInput::Text { content } => Self::from_text(content),
        }
    }
}

impl StructuredRequest for BloodReportRequest {
    fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let has_photo = !is_blank(&self.report_photo_data_uri);
        let has_text = !is_blank(&self.report_text);

        if !has_photo && !has_text {
            return Err(vec![
                FieldViolation::new("reportPhotoDataUri", "provide a report photo or report text"),
                FieldViolation::new("reportText", "provide a report photo or report text"),
            ]);
        }

        if let Some(uri) = self.report_photo_data_uri.as_deref().filter(|_| has_photo) {
            if let Err(reason) = InlineImage::from_data_uri(uri) {
                return Err(vec![FieldViolation::new("reportPhotoDataUri", reason)]);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LabStatus {
    Low,
    Normal,
    High,
}

impl LabStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabFinding {
    /// Name of the test parameter (e.g. Hemoglobin, Glucose).
    pub parameter: String,
    /// Measured value as written in the report.
    pub value: String,
    pub unit: String,
    /// Normal range given by the lab, or a standard clinical range with a note.
    pub reference_range: String,
    /// Whether the value is below, within, or above the normal range.
    pub status: LabStatus,
    /// What this parameter means for the user.
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BloodReportResult {
    /// High-level brief of the overall findings.
    pub summary: String,
    /// Every lab parameter found, in report order.
    pub findings: Vec<LabFinding>,
    /// Clinical significance of the results taken together.
    pub detailed_analysis: String,
    /// Next steps or questions to ask a doctor.
    pub recommendations: String,
}

impl StructuredResponse for BloodReportResult {}

impl BloodReportResult {
    /// Findings outside their reference range.
    pub fn abnormal_findings(&self) -> impl Iterator<Item = &LabFinding> {
        self.findings
            .iter()
            .filter(|f| f.status != LabStatus::Normal)
    }
}
