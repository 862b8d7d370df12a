//! Deterministic pattern table
//!
//! Rules are evaluated in table order (EMERGENCY, then CONSULTATION, then
//! SELF-CARE) and the first match wins. Matching is keyword containment on
//! the extracted tokens, never fuzzy.

use serde::Serialize;
use tracing::debug;

use crate::extraction::is_known_symptom;
use crate::models::{ExtractedSymptoms, UrgencyLevel};

/// Condition a rule checks against the extracted symptoms
#[derive(Debug, Clone, Copy)]
pub enum Condition {
    /// Every group needs at least one keyword hit
    AllOf(&'static [&'static [&'static str]]),
    /// Any keyword hits
    AnyOf(&'static [&'static str]),
    /// Fever lasting `min_days`, or any temperature at or above `min_temp_c`
    PersistentFever {
        /// Keywords that count as a fever mention
        keywords: &'static [&'static str],
        /// Minimum duration in days
        min_days: u32,
        /// Temperature threshold in Celsius
        min_temp_c: f32,
    },
    /// At least `min_hits` distinct keywords hit
    Cluster {
        /// Members of the cluster
        terms: &'static [&'static str],
        /// Required number of members
        min_hits: usize,
    },
    /// A term is present and every other known symptom is one of `companions`
    Isolated {
        /// Terms that trigger the rule
        terms: &'static [&'static str],
        /// Symptoms allowed alongside
        companions: &'static [&'static str],
    },
}

impl Condition {
    fn matches(&self, symptoms: &ExtractedSymptoms) -> bool {
        match self {
            Condition::AllOf(groups) => groups
                .iter()
                .all(|group| group.iter().any(|kw| symptoms.mentions(kw))),
            Condition::AnyOf(keywords) => keywords.iter().any(|kw| symptoms.mentions(kw)),
            Condition::PersistentFever {
                keywords,
                min_days,
                min_temp_c,
            } => {
                let hot = symptoms.temperature_c().is_some_and(|t| t >= *min_temp_c);
                let lasting = keywords.iter().any(|kw| symptoms.mentions(kw))
                    && symptoms.duration_days().is_some_and(|d| d >= *min_days);
                hot || lasting
            }
            Condition::Cluster { terms, min_hits } => {
                terms.iter().filter(|kw| symptoms.mentions(kw)).count() >= *min_hits
            }
            Condition::Isolated { terms, companions } => {
                terms.iter().any(|kw| symptoms.mentions(kw))
                    && symptoms
                        .tokens()
                        .iter()
                        .filter(|token| is_known_symptom(token))
                        .all(|token| {
                            terms.contains(&token.as_str()) || companions.contains(&token.as_str())
                        })
            }
        }
    }
}

/// One row of the pattern table
#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    /// Stable rule identifier
    pub id: &'static str,
    /// Urgency the rule resolves to
    pub urgency: UrgencyLevel,
    /// Human-readable description
    pub description: &'static str,
    /// What the rule checks
    pub condition: Condition,
}

/// A rule that fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    /// Rule identifier
    pub rule_id: &'static str,
    /// Urgency of the rule
    pub urgency: UrgencyLevel,
    /// Rule description
    pub description: &'static str,
}

const RADIATION: &[&str] = &["arm", "jaw", "shoulder", "radiat"];
const FEVER: &[&str] = &["fever"];
const WOUND: &[&str] = &["wound", "cut", "bite", "burn", "scrape"];
const INFECTION_SIGNS: &[&str] = &["redness", "swelling", "pus", "warmth"];
const COLD_CLUSTER: &[&str] = &["runny nose", "sore throat", "cough", "sneezing", "congestion"];
const MILD: &[&str] = &["mild", "slight", "minor"];

/// The ordered rule table
pub const RULES: &[PatternRule] = &[
    PatternRule {
        id: "EM-CARDIAC",
        urgency: UrgencyLevel::Emergency,
        description: "chest pain radiating to the arm or jaw",
        condition: Condition::AllOf(&[&["chest pain"], RADIATION]),
    },
    PatternRule {
        id: "EM-RESPIRATORY",
        urgency: UrgencyLevel::Emergency,
        description: "difficulty breathing or shortness of breath",
        condition: Condition::AnyOf(&["shortness of breath"]),
    },
    PatternRule {
        id: "EM-NEUROLOGICAL",
        urgency: UrgencyLevel::Emergency,
        description: "neurological deficit: slurred speech, facial droop or one-sided weakness",
        condition: Condition::AnyOf(&["slurred speech", "facial droop", "one-sided weakness"]),
    },
    PatternRule {
        id: "CO-FEVER",
        urgency: UrgencyLevel::Consultation,
        description: "fever lasting three days or more, or temperature of 39 C or higher",
        condition: Condition::PersistentFever {
            keywords: FEVER,
            min_days: 3,
            min_temp_c: 39.0,
        },
    },
    PatternRule {
        id: "CO-WOUND-INFECTION",
        urgency: UrgencyLevel::Consultation,
        description: "wound with redness, swelling or pus",
        condition: Condition::AllOf(&[WOUND, INFECTION_SIGNS]),
    },
    PatternRule {
        id: "SC-COMMON-COLD",
        urgency: UrgencyLevel::SelfCare,
        description: "common cold symptoms",
        condition: Condition::Cluster {
            terms: COLD_CLUSTER,
            min_hits: 2,
        },
    },
    PatternRule {
        id: "SC-MILD-HEADACHE",
        urgency: UrgencyLevel::SelfCare,
        description: "mild headache",
        condition: Condition::AllOf(&[&["headache"], MILD]),
    },
    PatternRule {
        id: "SC-ISOLATED-HEADACHE",
        urgency: UrgencyLevel::SelfCare,
        description: "isolated headache",
        condition: Condition::Isolated {
            terms: &["headache"],
            companions: &["fatigue"],
        },
    },
    PatternRule {
        id: "SC-FATIGUE",
        urgency: UrgencyLevel::SelfCare,
        description: "general fatigue without other symptoms",
        condition: Condition::Isolated {
            terms: &["fatigue"],
            companions: &[],
        },
    },
];

/// Evaluates the rule table
#[derive(Debug, Clone, Copy)]
pub struct PatternMatcher {
    rules: &'static [PatternRule],
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self { rules: RULES }
    }
}

impl PatternMatcher {
    /// First matching rule, or `None` when the evidence is insufficient
    pub fn evaluate(&self, symptoms: &ExtractedSymptoms) -> Option<PatternMatch> {
        let hit = self
            .rules
            .iter()
            .find(|rule| rule.condition.matches(symptoms))
            .map(|rule| PatternMatch {
                rule_id: rule.id,
                urgency: rule.urgency,
                description: rule.description,
            });
        debug!("Pattern evaluation: {:?}", hit.map(|m| m.rule_id));
        hit
    }

    /// The rule table in evaluation order
    pub fn rules(&self) -> &'static [PatternRule] {
        self.rules
    }
}
