//! Triage Prompts - prompt construction for the reasoning service
//!
//! This crate provides:
//! - The triage assessment prompt built from a query and its evidence
//! - The fixed system instructions for triage and chat

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod models;
pub mod templates;

use anyhow::Result;
use handlebars::Handlebars;
use serde::Serialize;

pub use models::*;
pub use templates::{CHAT_SYSTEM_PROMPT, TRIAGE_SYSTEM_PROMPT};

/// Prompt engine for managing and rendering templates
pub struct PromptEngine {
    handlebars: Handlebars<'static>,
}

impl PromptEngine {
    /// Create a new prompt engine with all templates registered
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        // Prompts are plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string("triage_assessment", templates::TRIAGE_ASSESSMENT_TEMPLATE)?;

        Ok(Self { handlebars })
    }

    /// Render a template with the given data
    pub fn render<T: Serialize>(&self, template_name: &str, data: &T) -> Result<String> {
        Ok(self.handlebars.render(template_name, data)?)
    }

    /// Generate the triage assessment prompt
    pub fn triage_assessment(&self, context: &TriagePromptContext) -> Result<String> {
        self.render("triage_assessment", context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::extraction::extract;
    use triage_core::models::{
        EvidenceBundle, GraphMatch, KnowledgeMatch, SymptomQuery, UrgencyLevel,
    };
    use uuid::Uuid;

    fn cardiac_match() -> KnowledgeMatch {
        KnowledgeMatch {
            record_id: Uuid::nil(),
            similarity: 0.8123,
            urgency: UrgencyLevel::Emergency,
            advice: "Call emergency services".to_string(),
            text: "Chest pain radiating to arm may indicate a heart attack".to_string(),
        }
    }

    fn bundle(text: &str) -> EvidenceBundle {
        let knowledge = vec![cardiac_match()];
        let graph = vec![GraphMatch {
            condition: "Heart attack".to_string(),
            weight: 2.0,
            contributing_symptoms: vec!["chest pain".to_string(), "arm".to_string()],
            severity: UrgencyLevel::Emergency,
        }];
        EvidenceBundle::new(extract(text), Some(knowledge), Some(graph))
    }

    #[test]
    fn test_assessment_includes_evidence() {
        let engine = PromptEngine::new().unwrap();
        let query = SymptomQuery::new("chest pain radiating to left arm")
            .with_age(45)
            .with_allergies("penicillin");
        let context = TriagePromptContext::new(&query, &bundle(&query.text));
        let prompt = engine.triage_assessment(&context).unwrap();

        assert!(prompt.starts_with("Symptoms: chest pain radiating to left arm"));
        assert!(prompt.contains("Age: 45 years"));
        assert!(prompt.contains("Allergies: penicillin"));
        assert!(prompt.contains("Recognized symptoms: chest pain, radiating, left, arm"));
        assert!(prompt.contains("- [EMERGENCY] (similarity 0.81) Chest pain radiating"));
        assert!(prompt.contains("- Heart attack (severity EMERGENCY, weight 2.00) from: chest pain, arm"));
        assert!(prompt.contains("\"urgency_level\""));
    }

    #[test]
    fn test_assessment_without_optional_parts() {
        let engine = PromptEngine::new().unwrap();
        let query = SymptomQuery::new("I feel odd");
        let bundle = EvidenceBundle::new(extract(&query.text), None, None);
        let prompt = engine
            .triage_assessment(&TriagePromptContext::new(&query, &bundle))
            .unwrap();

        assert!(!prompt.contains("Age:"));
        assert!(!prompt.contains("Allergies:"));
        assert!(!prompt.contains("<SIMILAR CASES>"));
        assert!(!prompt.contains("<CANDIDATE CONDITIONS>"));
    }

    #[test]
    fn test_vitals_and_no_html_escaping() {
        let engine = PromptEngine::new().unwrap();
        let query = SymptomQuery::new("fever for 4 days, 39.5C & can't sleep");
        let bundle = EvidenceBundle::new(extract(&query.text), Some(vec![]), Some(vec![]));
        let prompt = engine
            .triage_assessment(&TriagePromptContext::new(&query, &bundle))
            .unwrap();

        assert!(prompt.contains("Temperature: 39.5 C"));
        assert!(prompt.contains("Duration: 4 days"));
        assert!(prompt.contains("& can't sleep"));
    }
}
