//! Medical knowledge base records

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::UrgencyLevel;

/// One knowledge record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Record identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Symptom or condition description that gets embedded
    pub text: String,
    /// Category (cardiac, respiratory, ...)
    #[serde(default)]
    pub category: String,
    /// Urgency label; either scale is accepted
    pub urgency: UrgencyLevel,
    /// Recommended action
    pub advice: String,
}

impl KnowledgeRecord {
    /// Create a record with a fresh id
    pub fn new(
        text: impl Into<String>,
        category: impl Into<String>,
        urgency: UrgencyLevel,
        advice: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            category: category.into(),
            urgency,
            advice: advice.into(),
        }
    }
}

/// Read-only corpus, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    records: Vec<KnowledgeRecord>,
}

impl KnowledgeBase {
    /// Wrap a list of records
    pub fn new(records: Vec<KnowledgeRecord>) -> Self {
        Self { records }
    }

    /// Load records from a JSON array
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<KnowledgeRecord> = serde_json::from_str(&content)?;
        if records.iter().any(|r| r.text.trim().is_empty()) {
            return Err(Error::Configuration(format!(
                "knowledge file {} contains a record without text",
                path.display()
            )));
        }
        info!("Loaded {} knowledge records from {}", records.len(), path.display());
        Ok(Self { records })
    }

    /// Built-in corpus
    pub fn builtin() -> Self {
        use UrgencyLevel::*;

        let records = vec![
            KnowledgeRecord::new(
                "Chest pain with shortness of breath, sweating, or pain radiating to arm or jaw may indicate a heart attack",
                "cardiac",
                Emergency,
                "Call emergency services now. Chew an aspirin if you are not allergic and stay at rest.",
            ),
            KnowledgeRecord::new(
                "Severe headache with confusion, vision changes, slurred speech, facial droop or weakness on one side may indicate a stroke",
                "neurological",
                Emergency,
                "Call emergency services immediately and note the time the symptoms started.",
            ),
            KnowledgeRecord::new(
                "Difficulty breathing, wheezing, or inability to speak in full sentences requires urgent evaluation",
                "respiratory",
                Emergency,
                "Seek emergency care now. Sit upright and use a prescribed inhaler if you have one.",
            ),
            KnowledgeRecord::new(
                "Allergic reaction with swelling of face or tongue, hives or difficulty breathing is life-threatening",
                "allergic",
                Emergency,
                "Use an epinephrine auto-injector if available and call emergency services.",
            ),
            KnowledgeRecord::new(
                "Severe abdominal pain with fever, vomiting, or inability to pass gas may indicate a serious condition",
                "gastrointestinal",
                Consultation,
                "See a doctor today. Go to the emergency department if the pain becomes severe or constant.",
            ),
            KnowledgeRecord::new(
                "Fever above 39 C, or fever persisting for three days or more, needs medical evaluation",
                "fever",
                Consultation,
                "Book a consultation with a doctor, keep hydrated and monitor your temperature.",
            ),
            KnowledgeRecord::new(
                "Wound with spreading redness, swelling, warmth or pus suggests an infection",
                "skin",
                Consultation,
                "Have the wound examined by a healthcare professional; antibiotics may be needed.",
            ),
            KnowledgeRecord::new(
                "Persistent vomiting or diarrhea for more than 24 hours, especially with blood, requires medical evaluation",
                "gastrointestinal",
                Consultation,
                "Contact a doctor and drink small amounts of oral rehydration solution frequently.",
            ),
            KnowledgeRecord::new(
                "Dehydration symptoms: extreme thirst, dark urine, dizziness",
                "general",
                Consultation,
                "Increase fluid intake and seek care if symptoms are severe or do not improve.",
            ),
            KnowledgeRecord::new(
                "Common cold symptoms: runny nose, sore throat, sneezing, mild cough, usually self-limiting",
                "respiratory",
                SelfCare,
                "Rest, drink plenty of fluids and use over-the-counter remedies for symptom relief.",
            ),
            KnowledgeRecord::new(
                "Mild headache without other symptoms",
                "pain",
                SelfCare,
                "Rest, hydrate and take an over-the-counter pain reliever if needed.",
            ),
            KnowledgeRecord::new(
                "General tiredness or fatigue without other symptoms, often linked to poor sleep or stress",
                "general",
                SelfCare,
                "Prioritise sleep, regular meals and light exercise; see a doctor if it lasts for weeks.",
            ),
        ];

        Self { records }
    }

    /// All records
    pub fn records(&self) -> &[KnowledgeRecord] {
        &self.records
    }

    /// Look a record up by id
    pub fn get(&self, id: &Uuid) -> Option<&KnowledgeRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// No records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
