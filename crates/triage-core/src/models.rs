//! Data model shared by every stage of the triage pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Oldest accepted patient age in years
pub const MAX_AGE: u8 = 120;

/// Discrete triage severity, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UrgencyLevel {
    /// Manageable at home
    #[serde(rename = "SELF-CARE", alias = "LOW", alias = "MINIMAL", alias = "SELF_CARE")]
    SelfCare,
    /// Needs a professional consultation
    #[serde(rename = "CONSULTATION", alias = "HIGH", alias = "MODERATE")]
    Consultation,
    /// Needs emergency care now
    #[serde(rename = "EMERGENCY", alias = "CRITICAL")]
    Emergency,
}

impl UrgencyLevel {
    /// All levels, most urgent first
    pub const ALL: [UrgencyLevel; 3] = [
        UrgencyLevel::Emergency,
        UrgencyLevel::Consultation,
        UrgencyLevel::SelfCare,
    ];

    /// Canonical label
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Emergency => "EMERGENCY",
            UrgencyLevel::Consultation => "CONSULTATION",
            UrgencyLevel::SelfCare => "SELF-CARE",
        }
    }

    /// Parse a label from either the three-level or the five-level scale.
    ///
    /// CRITICAL maps to EMERGENCY, HIGH and MODERATE to CONSULTATION,
    /// LOW and MINIMAL to SELF-CARE.
    pub fn parse_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_uppercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();

        match normalized.as_str() {
            "EMERGENCY" | "CRITICAL" => Some(UrgencyLevel::Emergency),
            "CONSULTATION" | "HIGH" | "MODERATE" => Some(UrgencyLevel::Consultation),
            "SELF-CARE" | "SELFCARE" | "LOW" | "MINIMAL" => Some(UrgencyLevel::SelfCare),
            _ => None,
        }
    }

    /// Confidence band a result at this level must fall into
    pub fn band(&self) -> ConfidenceBand {
        match self {
            UrgencyLevel::Emergency => ConfidenceBand::new(0.85, 0.95),
            UrgencyLevel::Consultation => ConfidenceBand::new(0.70, 0.85),
            UrgencyLevel::SelfCare => ConfidenceBand::new(0.60, 0.75),
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrgencyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_label(s).ok_or_else(|| Error::validation(format!("unknown urgency level: {s}")))
    }
}

/// Closed confidence interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    /// Lower bound
    pub low: f32,
    /// Upper bound
    pub high: f32,
}

impl ConfidenceBand {
    /// Create a band
    pub const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    /// Middle of the band
    pub fn midpoint(&self) -> f32 {
        (self.low + self.high) / 2.0
    }

    /// Lower half of the band
    pub fn lower_half(&self) -> ConfidenceBand {
        ConfidenceBand::new(self.low, self.midpoint())
    }

    /// Upper half of the band
    pub fn upper_half(&self) -> ConfidenceBand {
        ConfidenceBand::new(self.midpoint(), self.high)
    }

    /// Linear position inside the band, `t` clamped to [0, 1]
    pub fn interpolate(&self, t: f32) -> f32 {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        (self.low * (1.0 - t) + self.high * t).clamp(self.low, self.high)
    }

    /// Whether a value lies inside the band (inclusive)
    pub fn contains(&self, value: f32) -> bool {
        value >= self.low - f32::EPSILON && value <= self.high + f32::EPSILON
    }
}

/// A patient's request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomQuery {
    /// Free-text symptom description
    pub text: String,
    /// Age in years
    #[serde(default)]
    pub age: Option<u8>,
    /// Known allergies
    #[serde(default)]
    pub allergies: Option<String>,
}

impl SymptomQuery {
    /// Create a query from symptom text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            age: None,
            allergies: None,
        }
    }

    /// Attach the patient's age
    pub fn with_age(mut self, age: u8) -> Self {
        self.age = Some(age);
        self
    }

    /// Attach known allergies
    pub fn with_allergies(mut self, allergies: impl Into<String>) -> Self {
        self.allergies = Some(allergies.into());
        self
    }

    /// Check the request preconditions. Used by the request layer only;
    /// the engine itself accepts whatever it is given.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::validation("symptom text must not be empty"));
        }
        if let Some(age) = self.age {
            if age > MAX_AGE {
                return Err(Error::validation(format!(
                    "age must be between 0 and {MAX_AGE}, got {age}"
                )));
            }
        }
        Ok(())
    }
}

/// Normalized symptoms extracted from a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSymptoms {
    tokens: Vec<String>,
    temperature_c: Option<f32>,
    duration_days: Option<u32>,
}

impl ExtractedSymptoms {
    /// Build from already-normalized tokens; duplicates are dropped, order kept
    pub fn new(tokens: Vec<String>, temperature_c: Option<f32>, duration_days: Option<u32>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if !unique.contains(&token) {
                unique.push(token);
            }
        }
        Self {
            tokens: unique,
            temperature_c,
            duration_days,
        }
    }

    /// Ordered symptom tokens
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Body temperature mentioned in the text, in Celsius
    pub fn temperature_c(&self) -> Option<f32> {
        self.temperature_c
    }

    /// Longest symptom duration mentioned in the text, in days
    pub fn duration_days(&self) -> Option<u32> {
        self.duration_days
    }

    /// No recognizable token was found
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether any token contains the keyword, see [`token_matches`]
    pub fn mentions(&self, keyword: &str) -> bool {
        self.tokens.iter().any(|t| token_matches(t, keyword))
    }
}

/// Keyword containment used by the pattern table and the graph store.
///
/// Multi-word keywords must appear verbatim inside the token; single words
/// must start one of the token's words, so `radiat` hits `radiating` but
/// `arm` does not hit `warm`.
pub fn token_matches(token: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        token.contains(keyword)
    } else {
        token
            .split(|c: char| c == ' ' || c == '-')
            .any(|word| word.starts_with(keyword))
    }
}

/// One similarity-index hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    /// Knowledge record id
    pub record_id: Uuid,
    /// Similarity in [0, 1]
    pub similarity: f32,
    /// Urgency label of the record
    pub urgency: UrgencyLevel,
    /// Recommended action
    pub advice: String,
    /// Record text
    pub text: String,
}

/// One relationship-graph candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMatch {
    /// Condition name
    pub condition: String,
    /// Sum of the matched edge weights
    pub weight: f32,
    /// Tokens that reached this condition
    pub contributing_symptoms: Vec<String>,
    /// Severity tier of the condition
    pub severity: UrgencyLevel,
}

/// Which sources contributed to a result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFlags {
    /// Similarity index answered
    pub knowledge: bool,
    /// Relationship graph answered
    pub graph: bool,
    /// Reasoning service produced a usable label
    pub reasoning: bool,
}

/// Immutable snapshot of everything retrieved for one request
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceBundle {
    symptoms: ExtractedSymptoms,
    knowledge: Vec<KnowledgeMatch>,
    graph: Vec<GraphMatch>,
    knowledge_ok: bool,
    graph_ok: bool,
}

impl EvidenceBundle {
    /// Assemble a bundle. A `None` source is recorded as failed.
    pub fn new(
        symptoms: ExtractedSymptoms,
        knowledge: Option<Vec<KnowledgeMatch>>,
        graph: Option<Vec<GraphMatch>>,
    ) -> Self {
        Self {
            symptoms,
            knowledge_ok: knowledge.is_some(),
            graph_ok: graph.is_some(),
            knowledge: knowledge.unwrap_or_default(),
            graph: graph.unwrap_or_default(),
        }
    }

    /// Extracted symptoms
    pub fn symptoms(&self) -> &ExtractedSymptoms {
        &self.symptoms
    }

    /// Similarity matches, best first
    pub fn knowledge(&self) -> &[KnowledgeMatch] {
        &self.knowledge
    }

    /// Graph candidates, heaviest first
    pub fn graph(&self) -> &[GraphMatch] {
        &self.graph
    }

    /// Similarity query succeeded
    pub fn knowledge_ok(&self) -> bool {
        self.knowledge_ok
    }

    /// Graph query succeeded
    pub fn graph_ok(&self) -> bool {
        self.graph_ok
    }

    /// At least one Stage-1 source succeeded
    pub fn any_source_ok(&self) -> bool {
        self.knowledge_ok || self.graph_ok
    }

    /// At least one source returned something
    pub fn has_matches(&self) -> bool {
        !self.knowledge.is_empty() || !self.graph.is_empty()
    }

    /// Plurality label of the similarity matches; ties go to the more urgent level
    pub fn knowledge_vote(&self) -> Option<UrgencyLevel> {
        if self.knowledge.is_empty() {
            return None;
        }
        let mut counts: HashMap<UrgencyLevel, usize> = HashMap::new();
        for m in &self.knowledge {
            *counts.entry(m.urgency).or_default() += 1;
        }
        UrgencyLevel::ALL
            .iter()
            .copied()
            .filter(|level| counts.contains_key(level))
            .max_by_key(|level| (counts[level], *level))
    }

    /// Label carrying the most similarity; ties go to the more urgent level
    pub fn knowledge_weighted_vote(&self) -> Option<UrgencyLevel> {
        let mut mass: HashMap<UrgencyLevel, f32> = HashMap::new();
        for m in &self.knowledge {
            *mass.entry(m.urgency).or_default() += m.similarity.max(0.0);
        }
        UrgencyLevel::ALL
            .iter()
            .copied()
            .filter(|level| mass.contains_key(level))
            .max_by(|a, b| mass[a].total_cmp(&mass[b]).then(a.cmp(b)))
    }

    /// Severity tier of the heaviest graph candidate
    pub fn graph_tier(&self) -> Option<UrgencyLevel> {
        self.graph.first().map(|m| m.severity)
    }

    /// Flags for the Stage-1 sources
    pub fn source_flags(&self, reasoning: bool) -> SourceFlags {
        SourceFlags {
            knowledge: self.knowledge_ok,
            graph: self.graph_ok,
            reasoning,
        }
    }
}

/// Parsed answer of the reasoning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningOutput {
    /// Urgency the model settled on
    pub urgency: UrgencyLevel,
    /// Advice text
    pub advice: String,
    /// Model-reported confidence, clamped to [0, 1]
    pub confidence: Option<f32>,
    /// Symptoms the model listed, if any
    #[serde(default)]
    pub detected_symptoms: Vec<String>,
}

/// Which branch of the fallback chain produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    /// Reasoning service label blended with retrieved evidence
    FullSynthesis,
    /// Pattern table cross-checked against index and graph
    EvidenceFallback,
    /// Nothing answered
    SafeDefault,
}

/// Final triage decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    /// Resolved urgency
    pub urgency_level: UrgencyLevel,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Human-readable advice
    pub advice: String,
    /// Extracted symptom tokens
    pub detected_symptoms: Vec<String>,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// Which sources contributed
    pub sources: SourceFlags,
    /// Which fallback path was taken
    pub resolution: ResolutionPath,
}
