//! Fallback composition
//!
//! Exactly one of three paths produces the decision: full synthesis when the
//! reasoning service answered, evidence fallback when only the index or the
//! graph did, and the safe default when nothing did. The safety rules are
//! applied on top.

use tracing::{info, warn};
use triage_core::error::TriageFailure;
use triage_core::models::{EvidenceBundle, ReasoningOutput, ResolutionPath, UrgencyLevel};
use triage_core::patterns::PatternMatch;

/// Confidence of the safe default
pub const SAFE_DEFAULT_CONFIDENCE: f32 = 0.5;

/// Confidence assumed when the model reports none
pub const DEFAULT_MODEL_CONFIDENCE: f32 = 0.5;

/// Advice of the safe default
pub const SAFE_DEFAULT_ADVICE: &str = "Your symptoms could not be fully evaluated because the assessment \
services are unavailable, so this result is based on reduced evidence. Please consult a healthcare \
professional for a proper evaluation. If your symptoms are severe or getting worse, seek emergency care.";

/// Prefix added to every evidence-fallback advice
pub const REDUCED_EVIDENCE_NOTE: &str =
    "This assessment is based on reduced evidence because the AI reasoning service was unavailable.";

/// Prefix added when a model answer is escalated to EMERGENCY
pub const EMERGENCY_WARNING: &str = "EMERGENCY WARNING: your symptoms match a pattern that needs \
immediate care. Call emergency services now.";

/// Default advice per level
pub fn default_advice(level: UrgencyLevel) -> &'static str {
    match level {
        UrgencyLevel::Emergency => {
            "Seek emergency care immediately or call your local emergency number."
        }
        UrgencyLevel::Consultation => {
            "Arrange a consultation with a healthcare professional soon."
        }
        UrgencyLevel::SelfCare => {
            "Rest, stay hydrated and monitor your symptoms. Contact a doctor if they worsen or persist."
        }
    }
}

/// Outcome of the composition stage
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Resolved urgency
    pub urgency: UrgencyLevel,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Advice text
    pub advice: String,
    /// Path taken
    pub resolution: ResolutionPath,
}

/// Combine the stage outcomes into one decision
pub fn compose(
    bundle: &EvidenceBundle,
    pattern: Result<PatternMatch, TriageFailure>,
    reasoning: Result<ReasoningOutput, TriageFailure>,
) -> Decision {
    let pattern = match pattern {
        Ok(hit) => Some(hit),
        Err(failure) => {
            info!("Pattern table: {}", failure);
            None
        }
    };

    let decision = match reasoning {
        Ok(output) => full_synthesis(bundle, pattern.as_ref(), &output),
        Err(failure) if bundle.any_source_ok() => {
            warn!("Reasoning failed ({}), using evidence fallback", failure);
            evidence_fallback(bundle, pattern.as_ref())
        }
        Err(failure) => {
            warn!("Reasoning failed ({}) and no evidence source answered", failure);
            safe_default()
        }
    };

    guard_insufficient_evidence(bundle, decision)
}

/// Path a: model label blended with agreement from the evidence
pub fn full_synthesis(
    bundle: &EvidenceBundle,
    pattern: Option<&PatternMatch>,
    output: &ReasoningOutput,
) -> Decision {
    let label = output.urgency;

    if let Some(hit) = pattern {
        if hit.urgency == UrgencyLevel::Emergency && label < UrgencyLevel::Emergency {
            warn!(
                "Model said {} but rule {} requires EMERGENCY, escalating",
                label, hit.rule_id
            );
            let advice = if output.advice.is_empty() {
                default_advice(UrgencyLevel::Emergency).to_string()
            } else {
                output.advice.clone()
            };
            return Decision {
                urgency: UrgencyLevel::Emergency,
                confidence: UrgencyLevel::Emergency.band().low,
                advice: format!("{EMERGENCY_WARNING} {advice}"),
                resolution: ResolutionPath::FullSynthesis,
            };
        }
    }

    let votes = evidence_votes(bundle, pattern);
    let agreements = votes.iter().filter(|vote| **vote == label).count();
    let model_confidence = output.confidence.unwrap_or(DEFAULT_MODEL_CONFIDENCE);
    let band = label.band();

    let confidence = if agreements > 0 {
        let agreement = agreements as f32 / votes.len() as f32;
        band.upper_half()
            .interpolate(0.5 * agreement + 0.5 * model_confidence)
    } else {
        band.lower_half().interpolate(0.5 * model_confidence)
    };

    Decision {
        urgency: label,
        confidence,
        advice: if output.advice.is_empty() {
            default_advice(label).to_string()
        } else {
            output.advice.clone()
        },
        resolution: ResolutionPath::FullSynthesis,
    }
}

/// Path b: pattern table cross-checked against the sources that answered.
///
/// The cross-check only ever raises. Without a pattern the starting level is
/// CONSULTATION.
pub fn evidence_fallback(bundle: &EvidenceBundle, pattern: Option<&PatternMatch>) -> Decision {
    let base = pattern.map_or(UrgencyLevel::Consultation, |hit| hit.urgency);
    let urgency = cross_check(bundle, base);
    if urgency > base {
        info!(
            "Sources raise {} to {} over rule {}",
            base,
            urgency,
            pattern.map_or("none", |hit| hit.rule_id)
        );
    }

    let advice = bundle
        .knowledge()
        .iter()
        .find(|m| m.urgency == urgency && !m.advice.is_empty())
        .map(|m| m.advice.as_str())
        .unwrap_or_else(|| default_advice(urgency));

    Decision {
        urgency,
        confidence: urgency.band().low,
        advice: format!("{REDUCED_EVIDENCE_NOTE} {advice}"),
        resolution: ResolutionPath::EvidenceFallback,
    }
}

/// Path c: nothing answered
pub fn safe_default() -> Decision {
    Decision {
        urgency: UrgencyLevel::Consultation,
        confidence: SAFE_DEFAULT_CONFIDENCE,
        advice: SAFE_DEFAULT_ADVICE.to_string(),
        resolution: ResolutionPath::SafeDefault,
    }
}

/// Raise SELF-CARE to CONSULTATION when nothing was recognized or matched
fn guard_insufficient_evidence(bundle: &EvidenceBundle, decision: Decision) -> Decision {
    if decision.urgency != UrgencyLevel::SelfCare
        || !bundle.symptoms().is_empty()
        || bundle.has_matches()
    {
        return decision;
    }

    warn!("{}: raising SELF-CARE to CONSULTATION", TriageFailure::InsufficientEvidence);
    Decision {
        urgency: UrgencyLevel::Consultation,
        confidence: UrgencyLevel::Consultation.band().low,
        advice: default_advice(UrgencyLevel::Consultation).to_string(),
        resolution: decision.resolution,
    }
}

fn evidence_votes(bundle: &EvidenceBundle, pattern: Option<&PatternMatch>) -> Vec<UrgencyLevel> {
    [
        bundle.knowledge_vote(),
        bundle.graph_tier(),
        pattern.map(|hit| hit.urgency),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// EMERGENCY when the knowledge matches lean EMERGENCY or every source that
/// answered votes it; otherwise at least CONSULTATION when any answering
/// source outranks `base`
fn cross_check(bundle: &EvidenceBundle, base: UrgencyLevel) -> UrgencyLevel {
    let knowledge = bundle.knowledge_weighted_vote();
    if knowledge == Some(UrgencyLevel::Emergency) || unanimous_emergency(bundle) {
        return UrgencyLevel::Emergency;
    }

    let outranked = [knowledge, bundle.graph_tier()]
        .into_iter()
        .flatten()
        .any(|vote| vote > base);
    if outranked {
        base.max(UrgencyLevel::Consultation)
    } else {
        base
    }
}

/// Every source that answered voted EMERGENCY; a source with no matches casts no vote
fn unanimous_emergency(bundle: &EvidenceBundle) -> bool {
    let mut voters = Vec::new();
    if bundle.knowledge_ok() {
        voters.push(bundle.knowledge_weighted_vote());
    }
    if bundle.graph_ok() {
        voters.push(bundle.graph_tier());
    }
    !voters.is_empty() && voters.iter().all(|v| *v == Some(UrgencyLevel::Emergency))
}
