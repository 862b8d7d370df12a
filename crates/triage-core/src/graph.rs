//! Symptom → condition relationship graph
//!
//! A directed, weighted graph loaded once at startup and shared read-only.
//! Symptom nodes point at condition nodes through `INDICATES` edges whose
//! weight is the observed association strength.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{token_matches, GraphMatch, UrgencyLevel};
use crate::source::{EvidenceRequest, EvidenceSource};

/// Relationship type of every symptom → condition edge
pub const INDICATES: &str = "INDICATES";

/// Symptom node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomNode {
    /// Unique identifier
    pub id: Uuid,
    /// Canonical symptom name
    pub name: String,
}

/// Condition node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionNode {
    /// Unique identifier
    pub id: Uuid,
    /// Condition name
    pub name: String,
    /// Severity tier
    pub severity: UrgencyLevel,
    /// Short description
    pub description: String,
}

/// Weighted edge from a symptom to a condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Symptom node ID
    pub source_id: Uuid,
    /// Condition node ID
    pub target_id: Uuid,
    /// Relationship type
    pub relationship: String,
    /// Association strength
    pub weight: f32,
}

/// Serialized form of the graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSeed {
    /// Conditions
    pub conditions: Vec<ConditionSeed>,
    /// Symptom → condition associations
    pub relationships: Vec<RelationshipSeed>,
}

/// Condition entry of a seed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSeed {
    /// Condition name
    pub name: String,
    /// Severity tier; either scale is accepted
    pub severity: UrgencyLevel,
    /// Short description
    #[serde(default)]
    pub description: String,
}

/// Relationship entry of a seed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSeed {
    /// Symptom name
    pub symptom: String,
    /// Condition name
    pub condition: String,
    /// Association strength
    pub weight: f32,
}

/// Node and edge counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Symptom nodes
    pub symptoms: usize,
    /// Condition nodes
    pub conditions: usize,
    /// INDICATES edges
    pub relationships: usize,
}

/// In-memory relationship graph store
#[derive(Debug, Clone, Default)]
pub struct SymptomGraph {
    symptoms: HashMap<String, SymptomNode>,
    conditions: HashMap<Uuid, ConditionNode>,
    outgoing: HashMap<Uuid, Vec<Edge>>,
}

impl SymptomGraph {
    /// Build a graph from a seed
    pub fn from_seed(seed: GraphSeed) -> Result<Self> {
        let mut graph = Self::default();
        let mut by_name: HashMap<String, Uuid> = HashMap::new();

        for condition in seed.conditions {
            let id = Uuid::new_v4();
            by_name.insert(condition.name.to_lowercase(), id);
            graph.conditions.insert(
                id,
                ConditionNode {
                    id,
                    name: condition.name,
                    severity: condition.severity,
                    description: condition.description,
                },
            );
        }

        for rel in seed.relationships {
            if !rel.weight.is_finite() || rel.weight < 0.0 {
                return Err(Error::Configuration(format!(
                    "edge {} -> {} has invalid weight {}",
                    rel.symptom, rel.condition, rel.weight
                )));
            }
            let target_id = *by_name.get(&rel.condition.to_lowercase()).ok_or_else(|| {
                Error::Configuration(format!("unknown condition in relationship: {}", rel.condition))
            })?;

            let name = rel.symptom.trim().to_lowercase();
            let source_id = graph
                .symptoms
                .entry(name.clone())
                .or_insert_with(|| SymptomNode {
                    id: Uuid::new_v4(),
                    name,
                })
                .id;

            graph.outgoing.entry(source_id).or_default().push(Edge {
                source_id,
                target_id,
                relationship: INDICATES.to_string(),
                weight: rel.weight,
            });
        }

        Ok(graph)
    }

    /// Load a seed from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let seed: GraphSeed = serde_json::from_str(&content)?;
        let graph = Self::from_seed(seed)?;
        info!("Loaded symptom graph from {}: {:?}", path.display(), graph.stats());
        Ok(graph)
    }

    /// Built-in medical graph
    pub fn builtin() -> Self {
        Self::from_seed(builtin_seed()).unwrap_or_default()
    }

    /// Node and edge counts
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            symptoms: self.symptoms.len(),
            conditions: self.conditions.len(),
            relationships: self.outgoing.values().map(Vec::len).sum(),
        }
    }

    /// Conditions reachable from the given tokens, ranked by summed edge weight.
    ///
    /// A token reaches a symptom node when it equals the node name or contains
    /// it (see [`token_matches`]). Ties are broken by severity, then name.
    #[instrument(skip(self, tokens), fields(tokens = tokens.len()))]
    pub fn related_conditions(&self, tokens: &[String], limit: usize) -> Result<Vec<GraphMatch>> {
        if self.conditions.is_empty() || self.symptoms.is_empty() {
            return Err(Error::GraphUnavailable("symptom graph is empty".to_string()));
        }

        let mut scores: HashMap<Uuid, (f32, Vec<String>)> = HashMap::new();
        for token in tokens {
            for symptom in self.symptoms.values() {
                if !(token == &symptom.name || token_matches(token, &symptom.name)) {
                    continue;
                }
                for edge in self.outgoing.get(&symptom.id).into_iter().flatten() {
                    let entry = scores.entry(edge.target_id).or_default();
                    entry.0 += edge.weight;
                    if !entry.1.contains(token) {
                        entry.1.push(token.clone());
                    }
                }
            }
        }

        let mut matches: Vec<GraphMatch> = scores
            .into_iter()
            .filter_map(|(id, (weight, contributing))| {
                self.conditions.get(&id).map(|c| GraphMatch {
                    condition: c.name.clone(),
                    weight,
                    contributing_symptoms: contributing,
                    severity: c.severity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.severity.cmp(&a.severity))
                .then_with(|| a.condition.cmp(&b.condition))
        });
        matches.truncate(limit);

        debug!("Graph returned {} candidate conditions", matches.len());
        Ok(matches)
    }
}

/// Graph query as an evidence source
pub struct GraphSearch {
    graph: Arc<SymptomGraph>,
    limit: usize,
}

impl GraphSearch {
    /// Create a source over a shared graph
    pub fn new(graph: Arc<SymptomGraph>, limit: usize) -> Self {
        Self { graph, limit }
    }
}

#[async_trait]
impl EvidenceSource for GraphSearch {
    type Output = Vec<GraphMatch>;

    fn name(&self) -> &'static str {
        "graph"
    }

    async fn is_available(&self) -> bool {
        self.graph.stats().relationships > 0
    }

    async fn query(&self, request: &EvidenceRequest<'_>) -> Result<Vec<GraphMatch>> {
        self.graph
            .related_conditions(request.symptoms.tokens(), self.limit)
    }
}

fn builtin_seed() -> GraphSeed {
    use UrgencyLevel::*;

    let conditions = [
        ("Heart attack", Emergency, "Blocked blood flow to the heart muscle"),
        ("Stroke", Emergency, "Interrupted blood supply to the brain"),
        ("Anaphylaxis", Emergency, "Severe allergic reaction"),
        ("Pulmonary embolism", Emergency, "Blood clot in the lungs"),
        ("Appendicitis", Emergency, "Inflamed appendix"),
        ("Pneumonia", Consultation, "Lung infection"),
        ("Influenza", Consultation, "Seasonal flu"),
        ("Wound infection", Consultation, "Bacterial infection of a skin wound"),
        ("Gastroenteritis", Consultation, "Stomach and intestinal infection"),
        ("Dehydration", Consultation, "Insufficient body fluids"),
        ("Migraine", Consultation, "Recurrent severe headache"),
        ("Common cold", SelfCare, "Viral upper respiratory infection"),
        ("Tension headache", SelfCare, "Headache from muscle tension or stress"),
        ("Sleep deprivation", SelfCare, "Insufficient rest"),
    ];

    let relationships: &[(&str, &str, f32)] = &[
        ("chest pain", "Heart attack", 0.9),
        ("radiating", "Heart attack", 0.6),
        ("arm", "Heart attack", 0.5),
        ("jaw", "Heart attack", 0.5),
        ("shortness of breath", "Heart attack", 0.5),
        ("sweating", "Heart attack", 0.5),
        ("nausea", "Heart attack", 0.2),
        ("slurred speech", "Stroke", 0.9),
        ("facial droop", "Stroke", 0.9),
        ("one-sided weakness", "Stroke", 0.9),
        ("confusion", "Stroke", 0.6),
        ("dizziness", "Stroke", 0.3),
        ("headache", "Stroke", 0.2),
        ("shortness of breath", "Anaphylaxis", 0.6),
        ("swelling", "Anaphylaxis", 0.4),
        ("hives", "Anaphylaxis", 0.5),
        ("wheezing", "Anaphylaxis", 0.5),
        ("rash", "Anaphylaxis", 0.3),
        ("shortness of breath", "Pulmonary embolism", 0.7),
        ("chest pain", "Pulmonary embolism", 0.5),
        ("cough", "Pulmonary embolism", 0.2),
        ("abdominal pain", "Appendicitis", 0.6),
        ("fever", "Appendicitis", 0.3),
        ("vomiting", "Appendicitis", 0.3),
        ("nausea", "Appendicitis", 0.3),
        ("fever", "Pneumonia", 0.6),
        ("cough", "Pneumonia", 0.6),
        ("shortness of breath", "Pneumonia", 0.4),
        ("chills", "Pneumonia", 0.4),
        ("fatigue", "Pneumonia", 0.3),
        ("fever", "Influenza", 0.7),
        ("fatigue", "Influenza", 0.5),
        ("chills", "Influenza", 0.5),
        ("muscle aches", "Influenza", 0.5),
        ("cough", "Influenza", 0.4),
        ("headache", "Influenza", 0.3),
        ("wound", "Wound infection", 0.6),
        ("redness", "Wound infection", 0.7),
        ("swelling", "Wound infection", 0.6),
        ("pus", "Wound infection", 0.9),
        ("fever", "Wound infection", 0.3),
        ("vomiting", "Gastroenteritis", 0.7),
        ("diarrhea", "Gastroenteritis", 0.7),
        ("nausea", "Gastroenteritis", 0.6),
        ("abdominal pain", "Gastroenteritis", 0.5),
        ("fever", "Gastroenteritis", 0.2),
        ("thirst", "Dehydration", 0.7),
        ("dark urine", "Dehydration", 0.8),
        ("dizziness", "Dehydration", 0.5),
        ("fatigue", "Dehydration", 0.3),
        ("headache", "Migraine", 0.7),
        ("nausea", "Migraine", 0.4),
        ("light sensitivity", "Migraine", 0.6),
        ("runny nose", "Common cold", 0.8),
        ("sneezing", "Common cold", 0.7),
        ("congestion", "Common cold", 0.7),
        ("sore throat", "Common cold", 0.6),
        ("cough", "Common cold", 0.5),
        ("headache", "Common cold", 0.1),
        ("headache", "Tension headache", 0.8),
        ("neck pain", "Tension headache", 0.3),
        ("stress", "Tension headache", 0.4),
        ("fatigue", "Tension headache", 0.3),
        ("fatigue", "Sleep deprivation", 0.8),
        ("headache", "Sleep deprivation", 0.2),
    ];

    GraphSeed {
        conditions: conditions
            .iter()
            .map(|(name, severity, description)| ConditionSeed {
                name: name.to_string(),
                severity: *severity,
                description: description.to_string(),
            })
            .collect(),
        relationships: relationships
            .iter()
            .map(|(symptom, condition, weight)| RelationshipSeed {
                symptom: symptom.to_string(),
                condition: condition.to_string(),
                weight: *weight,
            })
            .collect(),
    }
}
