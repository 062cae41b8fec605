//! Medical assistant features: symptom analysis, blood report interpretation
//! and open medical Q&A, each a fixed structured query against the hosted model.

pub mod blood_report;
pub mod lookup;
pub mod medical_query;
pub mod report;
pub mod symptoms;

pub use blood_report::*;
pub use lookup::*;
pub use medical_query::*;
pub use symptoms::*;

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::pipeline::extraction::{DocumentNormalizer, NormalizeError, UploadedDocument};
use crate::pipeline::structuring::{QueryError, QuerySpec, StructuredExecutor};

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl AssistantError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Normalize(e) => e.is_retryable(),
            Self::Query(e) => e.is_retryable(),
        }
    }
}

/// Entry point for every assistant feature.
pub struct MedicalAssistant {
    executor: StructuredExecutor,
    normalizer: DocumentNormalizer,
    symptom_query: QuerySpec,
    blood_report_query: QuerySpec,
    medical_query: QuerySpec,
}

impl MedicalAssistant {
    pub fn new(executor: StructuredExecutor, normalizer: DocumentNormalizer) -> Self {
        Self {
            executor,
            normalizer,
            symptom_query: symptom_query(),
            blood_report_query: blood_report_query(),
            medical_query: medical_query(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.executor.model_name()
    }

    pub fn extractors_ready(&self) -> bool {
        self.normalizer.extractors().is_ready()
    }

    /// Start loading the document extraction backends in the background.
    pub fn prewarm(&self) -> JoinHandle<()> {
        Arc::clone(self.normalizer.extractors()).prewarm()
    }

    pub async fn analyze_symptoms(
        &self,
        request: &SymptomRequest,
    ) -> Result<SymptomResult, AssistantError> {
        Ok(self.executor.execute(&self.symptom_query, request).await?)
    }

    pub async fn analyze_blood_report(
        &self,
        request: &BloodReportRequest,
    ) -> Result<BloodReportResult, AssistantError> {
        let result: BloodReportResult =
            self.executor.execute(&self.blood_report_query, request).await?;
        tracing::info!(
            findings = result.findings.len(),
            abnormal = result.abnormal_findings().count(),
            "Blood report analyzed"
        );
        Ok(result)
    }

    /// Normalize an uploaded report, then analyze it.
    pub async fn analyze_blood_report_upload(
        &self,
        document: UploadedDocument,
    ) -> Result<BloodReportResult, AssistantError> {
        let input = self.normalizer.normalize(document).await?;
        tracing::info!(input_kind = input.kind(), "Blood report upload normalized");
        self.analyze_blood_report(&BloodReportRequest::from(input)).await
    }

    pub async fn answer_medical_query(
        &self,
        request: &MedicalQueryRequest,
    ) -> Result<AnswerResult, AssistantError> {
        Ok(self.executor.execute(&self.medical_query, request).await?)
    }
}
