//! Data models for prompt templates

use serde::{Deserialize, Serialize};
use triage_core::models::{EvidenceBundle, SymptomQuery};

/// Graph candidates shown to the model
pub const MAX_PROMPT_CONDITIONS: usize = 5;

/// One similarity match as shown to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeLine {
    /// Urgency label of the record
    pub urgency: String,
    /// Similarity, two decimals
    pub similarity: String,
    /// Record text
    pub text: String,
}

/// One graph candidate as shown to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionLine {
    /// Condition name
    pub name: String,
    /// Severity tier
    pub severity: String,
    /// Aggregated weight, two decimals
    pub weight: String,
    /// Contributing symptoms, comma separated
    pub symptoms: String,
}

/// Everything the triage assessment template renders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriagePromptContext {
    /// Raw symptom text
    pub symptoms: String,
    /// Patient age
    pub age: Option<u8>,
    /// Known allergies
    pub allergies: Option<String>,
    /// Extracted symptom tokens
    pub detected: Vec<String>,
    /// Parsed vital hints
    pub vitals: Vec<String>,
    /// Similarity matches
    pub knowledge: Vec<KnowledgeLine>,
    /// Graph candidates
    pub conditions: Vec<ConditionLine>,
}

impl TriagePromptContext {
    /// Build the context from a query and its evidence
    pub fn new(query: &SymptomQuery, bundle: &EvidenceBundle) -> Self {
        let symptoms = bundle.symptoms();

        let mut vitals = Vec::new();
        if let Some(temp) = symptoms.temperature_c() {
            vitals.push(format!("Temperature: {temp:.1} C"));
        }
        if let Some(days) = symptoms.duration_days() {
            vitals.push(format!("Duration: {days} days"));
        }

        Self {
            symptoms: query.text.trim().to_string(),
            age: query.age,
            allergies: query
                .allergies
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            detected: symptoms.tokens().to_vec(),
            vitals,
            knowledge: bundle
                .knowledge()
                .iter()
                .map(|m| KnowledgeLine {
                    urgency: m.urgency.to_string(),
                    similarity: format!("{:.2}", m.similarity),
                    text: m.text.clone(),
                })
                .collect(),
            conditions: bundle
                .graph()
                .iter()
                .take(MAX_PROMPT_CONDITIONS)
                .map(|m| ConditionLine {
                    name: m.condition.clone(),
                    severity: m.severity.to_string(),
                    weight: format!("{:.2}", m.weight),
                    symptoms: m.contributing_symptoms.join(", "),
                })
                .collect(),
        }
    }
}
