//! Evidence source abstraction

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ExtractedSymptoms;

/// What a source is asked about
#[derive(Debug, Clone, Copy)]
pub struct EvidenceRequest<'a> {
    /// Raw symptom text as the patient wrote it
    pub raw_text: &'a str,
    /// Tokens extracted from it
    pub symptoms: &'a ExtractedSymptoms,
}

/// An independent upstream source of triage evidence
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// What the source returns
    type Output: Send;

    /// Short name used in logs and failure reports
    fn name(&self) -> &'static str;

    /// Cheap readiness check; an unavailable source is skipped
    async fn is_available(&self) -> bool {
        true
    }

    /// Run the query
    async fn query(&self, request: &EvidenceRequest<'_>) -> Result<Self::Output>;
}
