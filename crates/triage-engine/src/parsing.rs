//! Interpretation of reasoning service output
//!
//! Three attempts, in order: a JSON object (optionally inside a markdown
//! code fence), an explicit urgency token of either scale, and finally
//! keyword inference where EMERGENCY keywords are checked before
//! CONSULTATION before SELF-CARE.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use triage_core::error::TriageFailure;
use triage_core::models::{ReasoningOutput, UrgencyLevel};

static LABELED_URGENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)urgency(?:[\s_-]*level)?\W{0,4}(emergency|critical|consultation|high|moderate|self[\s_-]?care|low|minimal)\b",
    )
    .expect("valid labeled urgency regex")
});

static URGENCY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(EMERGENCY|CRITICAL|CONSULTATION|HIGH|MODERATE|SELF[\s_-]?CARE|LOW|MINIMAL)\b")
        .expect("valid urgency token regex")
});

static CONFIDENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)confidence\W{0,4}(\d+(?:\.\d+)?|\.\d+)\s*(%)?").expect("valid confidence regex")
});

/// Keyword table, most urgent level first
const KEYWORDS: &[(UrgencyLevel, &[&str])] = &[
    (
        UrgencyLevel::Emergency,
        &[
            "emergency",
            "call 911",
            "ambulance",
            "immediate",
            "immediately",
            "life-threatening",
            "urgent care",
            "arrest",
        ],
    ),
    (
        UrgencyLevel::Consultation,
        &[
            "see a doctor",
            "consult",
            "consultation",
            "appointment",
            "medical attention",
            "healthcare provider",
            "healthcare professional",
            "physician",
            "clinic",
        ],
    ),
    (
        UrgencyLevel::SelfCare,
        &[
            "self-care",
            "self care",
            "at home",
            "rest",
            "over-the-counter",
            "hydrate",
            "hydrated",
            "hydration",
        ],
    ),
];

/// One whole-word alternation per level, in table order
static KEYWORD_PATTERNS: Lazy<Vec<(UrgencyLevel, Regex)>> = Lazy::new(|| {
    KEYWORDS
        .iter()
        .map(|(level, keywords)| {
            let alternation: Vec<String> = keywords.iter().map(|kw| regex::escape(kw)).collect();
            let pattern = format!(r"(?i)\b(?:{})\b", alternation.join("|"));
            (*level, Regex::new(&pattern).expect("valid keyword regex"))
        })
        .collect()
});

#[derive(Debug, Deserialize)]
struct RawAssessment {
    #[serde(alias = "urgency", alias = "urgencyLevel")]
    urgency_level: Option<String>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
    #[serde(default)]
    advice: Option<String>,
    #[serde(default)]
    detected_symptoms: Option<Vec<String>>,
}

/// Interpret the raw model text
pub fn parse_reasoning(text: &str) -> Result<ReasoningOutput, TriageFailure> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TriageFailure::ParseFailure);
    }

    if let Some(output) = parse_json(text) {
        debug!("Reasoning parsed from JSON: {}", output.urgency);
        return Ok(output);
    }

    let urgency = explicit_label(text)
        .or_else(|| infer_from_keywords(text))
        .ok_or(TriageFailure::ParseFailure)?;
    debug!("Reasoning parsed from free text: {}", urgency);

    Ok(ReasoningOutput {
        urgency,
        advice: text.to_string(),
        confidence: CONFIDENCE
            .captures(text)
            .and_then(|c| normalize_confidence(&c[1], c.get(2).is_some())),
        detected_symptoms: Vec::new(),
    })
}

fn parse_json(text: &str) -> Option<ReasoningOutput> {
    let body = strip_code_fence(text);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }

    let raw: RawAssessment = serde_json::from_str(&body[start..=end]).ok()?;
    let urgency = UrgencyLevel::parse_label(raw.urgency_level.as_deref()?)?;

    let confidence = raw.confidence.and_then(|value| match value {
        serde_json::Value::Number(n) => n.as_f64().and_then(|v| normalize_value(v as f32)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(pct) => normalize_confidence(pct.trim(), true),
                None => normalize_confidence(s, false),
            }
        }
        _ => None,
    });

    Some(ReasoningOutput {
        urgency,
        advice: raw.advice.map(|a| a.trim().to_string()).unwrap_or_default(),
        confidence,
        detected_symptoms: raw
            .detected_symptoms
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
    })
}

/// Text between a leading ```json (or ```) fence and the closing one
fn strip_code_fence(text: &str) -> &str {
    let after = if let Some(idx) = text.find("```json") {
        &text[idx + "```json".len()..]
    } else if let Some(idx) = text.find("```") {
        &text[idx + 3..]
    } else {
        return text;
    };
    match after.find("```") {
        Some(end) => after[..end].trim(),
        None => after.trim(),
    }
}

/// A labeled urgency, else the most urgent upper-case urgency token
fn explicit_label(text: &str) -> Option<UrgencyLevel> {
    if let Some(captures) = LABELED_URGENCY.captures(text) {
        if let Some(level) = UrgencyLevel::parse_label(&captures[1]) {
            return Some(level);
        }
    }

    URGENCY_TOKEN
        .captures_iter(text)
        .filter_map(|c| UrgencyLevel::parse_label(&c[1]))
        .max()
}

fn infer_from_keywords(text: &str) -> Option<UrgencyLevel> {
    KEYWORD_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(level, _)| *level)
}

fn normalize_confidence(raw: &str, percent: bool) -> Option<f32> {
    let value: f32 = raw.parse().ok()?;
    if percent {
        normalize_value(value / 100.0)
    } else {
        normalize_value(value)
    }
}

/// Values in (1, 100] are read as percentages
fn normalize_value(value: f32) -> Option<f32> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let value = if value > 1.0 && value <= 100.0 {
        value / 100.0
    } else {
        value
    };
    Some(value.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let output = parse_reasoning(
            r#"{"urgency_level": "EMERGENCY", "confidence": 0.9, "advice": "Call 911", "detected_symptoms": ["Chest Pain"]}"#,
        )
        .unwrap();
        assert_eq!(output.urgency, UrgencyLevel::Emergency);
        assert_eq!(output.confidence, Some(0.9));
        assert_eq!(output.advice, "Call 911");
        assert_eq!(output.detected_symptoms, vec!["chest pain".to_string()]);
    }

    #[test]
    fn test_fenced_json_with_five_level_label() {
        let text = "Here is my assessment:\n```json\n{\"urgency_level\": \"MODERATE\", \"confidence\": \"85%\", \"advice\": \"See a doctor\"}\n```\nStay safe.";
        let output = parse_reasoning(text).unwrap();
        assert_eq!(output.urgency, UrgencyLevel::Consultation);
        assert!((output.confidence.unwrap() - 0.85).abs() < 1e-6);
        assert!(output.detected_symptoms.is_empty());
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n{\"urgency\": \"low\", \"advice\": \"Rest\"}\n```";
        assert_eq!(parse_reasoning(text).unwrap().urgency, UrgencyLevel::SelfCare);
    }

    #[test]
    fn test_json_with_unknown_label_falls_through() {
        let text = r#"{"urgency_level": "URGENT", "advice": "Go to the emergency department"}"#;
        assert_eq!(parse_reasoning(text).unwrap().urgency, UrgencyLevel::Emergency);
    }

    #[test]
    fn test_labeled_free_text() {
        let output = parse_reasoning("Urgency level: moderate. Confidence: 70%. Book a visit.").unwrap();
        assert_eq!(output.urgency, UrgencyLevel::Consultation);
        assert!((output.confidence.unwrap() - 0.70).abs() < 1e-6);
        assert!(output.advice.starts_with("Urgency level"));
    }

    #[test]
    fn test_uppercase_token_most_urgent_wins() {
        let output = parse_reasoning("Not LOW risk. This is CRITICAL.").unwrap();
        assert_eq!(output.urgency, UrgencyLevel::Emergency);
    }

    #[test]
    fn test_keyword_inference_order() {
        let text = "Please rest, but go to urgent care immediately if it worsens.";
        assert_eq!(parse_reasoning(text).unwrap().urgency, UrgencyLevel::Emergency);

        let text = "You should see a doctor this week and rest meanwhile.";
        assert_eq!(parse_reasoning(text).unwrap().urgency, UrgencyLevel::Consultation);

        let text = "Drink water and rest at home.";
        assert_eq!(parse_reasoning(text).unwrap().urgency, UrgencyLevel::SelfCare);
    }

    #[test]
    fn test_keywords_match_whole_words() {
        let text = "These signs are consistent with cardiac arrest.";
        assert_eq!(parse_reasoning(text).unwrap().urgency, UrgencyLevel::Emergency);

        let text = "Possible respiratory arrest; act now.";
        assert_eq!(parse_reasoning(text).unwrap().urgency, UrgencyLevel::Emergency);

        assert_eq!(
            parse_reasoning("The patient seems restless and shows signs of dehydration."),
            Err(TriageFailure::ParseFailure)
        );
        assert_eq!(
            parse_reasoning("Of interest: no further findings."),
            Err(TriageFailure::ParseFailure)
        );

        let text = "Stay hydrated and get plenty of rest.";
        assert_eq!(parse_reasoning(text).unwrap().urgency, UrgencyLevel::SelfCare);

        let text = "Book a consultation with your GP.";
        assert_eq!(parse_reasoning(text).unwrap().urgency, UrgencyLevel::Consultation);
    }

    #[test]
    fn test_uninterpretable() {
        assert_eq!(parse_reasoning("   "), Err(TriageFailure::ParseFailure));
        assert_eq!(
            parse_reasoning("I am not sure what to say."),
            Err(TriageFailure::ParseFailure)
        );
    }

    #[test]
    fn test_confidence_normalization() {
        assert_eq!(normalize_value(0.4), Some(0.4));
        assert_eq!(normalize_value(85.0), Some(0.85));
        assert_eq!(normalize_value(250.0), Some(1.0));
        assert_eq!(normalize_value(-1.0), None);
        assert_eq!(normalize_value(f32::NAN), None);
    }
}
