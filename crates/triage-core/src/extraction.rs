//! Symptom extraction from free text
//!
//! Lower-cases the input, pulls out temperature and duration hints, folds
//! multi-word phrases and single-word synonyms onto canonical symptom names
//! and drops stop-words. Anything else alphabetic survives as a generic token.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use crate::models::ExtractedSymptoms;

/// Multi-word phrases and the canonical symptom they stand for
const PHRASES: &[(&str, &str)] = &[
    ("pain in my chest", "chest pain"),
    ("pain in the chest", "chest pain"),
    ("pain in chest", "chest pain"),
    ("chest pain", "chest pain"),
    ("chest tightness", "chest pain"),
    ("tight chest", "chest pain"),
    ("chest pressure", "chest pain"),
    ("shortness of breath", "shortness of breath"),
    ("short of breath", "shortness of breath"),
    ("difficulty breathing", "shortness of breath"),
    ("trouble breathing", "shortness of breath"),
    ("breathing difficulty", "shortness of breath"),
    ("hard to breathe", "shortness of breath"),
    ("can't breathe", "shortness of breath"),
    ("cannot breathe", "shortness of breath"),
    ("slurred speech", "slurred speech"),
    ("speech is slurred", "slurred speech"),
    ("difficulty speaking", "slurred speech"),
    ("trouble speaking", "slurred speech"),
    ("facial droop", "facial droop"),
    ("face drooping", "facial droop"),
    ("drooping face", "facial droop"),
    ("face droop", "facial droop"),
    ("one sided weakness", "one-sided weakness"),
    ("weakness on one side", "one-sided weakness"),
    ("numbness on one side", "one-sided weakness"),
    ("runny nose", "runny nose"),
    ("stuffy nose", "congestion"),
    ("blocked nose", "congestion"),
    ("nasal congestion", "congestion"),
    ("sore throat", "sore throat"),
    ("throat pain", "sore throat"),
    ("high temperature", "fever"),
    ("high fever", "fever"),
    ("stomach ache", "abdominal pain"),
    ("stomach pain", "abdominal pain"),
    ("abdominal pain", "abdominal pain"),
    ("belly pain", "abdominal pain"),
    ("head ache", "headache"),
    ("throwing up", "vomiting"),
    ("muscle aches", "muscle aches"),
    ("body aches", "muscle aches"),
    ("dark urine", "dark urine"),
    ("sensitivity to light", "light sensitivity"),
    ("light sensitivity", "light sensitivity"),
    ("neck pain", "neck pain"),
];

/// Single-word synonyms
const SYNONYMS: &[(&str, &str)] = &[
    ("tired", "fatigue"),
    ("tiredness", "fatigue"),
    ("exhausted", "fatigue"),
    ("exhaustion", "fatigue"),
    ("fatigued", "fatigue"),
    ("lethargic", "fatigue"),
    ("lethargy", "fatigue"),
    ("weary", "fatigue"),
    ("feverish", "fever"),
    ("febrile", "fever"),
    ("pyrexia", "fever"),
    ("breathless", "shortness of breath"),
    ("dyspnea", "shortness of breath"),
    ("coughing", "cough"),
    ("coughs", "cough"),
    ("sneeze", "sneezing"),
    ("sneezes", "sneezing"),
    ("congested", "congestion"),
    ("headaches", "headache"),
    ("vomit", "vomiting"),
    ("vomited", "vomiting"),
    ("nauseous", "nausea"),
    ("nauseated", "nausea"),
    ("dizzy", "dizziness"),
    ("lightheaded", "dizziness"),
    ("swollen", "swelling"),
    ("red", "redness"),
    ("reddened", "redness"),
    ("oozing", "pus"),
    ("radiates", "radiating"),
    ("radiated", "radiating"),
    ("spreading", "radiating"),
    ("laceration", "wound"),
    ("wounds", "wound"),
    ("wheeze", "wheezing"),
    ("diarrhoea", "diarrhea"),
    ("thirsty", "thirst"),
    ("sweaty", "sweating"),
    ("confused", "confusion"),
    ("rashes", "rash"),
];

/// Canonical symptoms known besides the phrase and synonym targets
const BASE_SYMPTOMS: &[&str] = &[
    "cough",
    "fever",
    "headache",
    "nausea",
    "rash",
    "hives",
    "wheezing",
    "chills",
    "diarrhea",
    "thirst",
    "confusion",
    "sweating",
    "wound",
    "pus",
    "redness",
    "swelling",
    "fatigue",
    "dizziness",
    "vomiting",
    "sneezing",
    "congestion",
    "stress",
];

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "ago", "all", "also", "am", "an", "and", "any", "are", "around",
    "as", "at", "be", "been", "before", "being", "bit", "but", "by", "can", "could", "day",
    "days", "did", "do", "does", "doing", "for", "from", "feel", "feeling", "feels", "felt",
    "get", "getting", "got", "had", "has", "have", "having", "he", "her", "here", "him", "his",
    "hour", "hours", "i", "i'm", "im", "i've", "ive", "if", "in", "into", "is", "it", "it's",
    "its", "just", "last", "like", "little", "lot", "me", "month", "months", "my", "no", "not",
    "now", "of", "on", "or", "our", "past", "quite", "really", "she", "since", "so", "some",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "to", "today", "too", "up", "very", "was", "we", "week", "weeks", "were", "what", "when",
    "while", "with", "without", "yesterday", "you", "your",
];

static TEMPERATURE_WITH_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2,3}(?:\.\d+)?)\s*(?:°|º|degrees?|deg)?\s*(celsius|fahrenheit|c|f)\b")
        .expect("valid temperature regex")
});

static TEMPERATURE_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:temperature|temp|fever)\s+(?:of\s+|is\s+|at\s+|was\s+|around\s+|about\s+)?(\d{2,3}(?:\.\d+)?)\b",
    )
    .expect("valid labeled temperature regex")
});

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(\d+|a|an|one|two|three|four|five|six|seven|eight|nine|ten)[\s-]+(days?|weeks?|months?)\b",
    )
    .expect("valid duration regex")
});

static DEFAULT_EXTRACTOR: Lazy<SymptomExtractor> = Lazy::new(SymptomExtractor::default);

static KNOWN_SYMPTOMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    PHRASES
        .iter()
        .map(|(_, canonical)| *canonical)
        .chain(SYNONYMS.iter().map(|(_, canonical)| *canonical))
        .chain(BASE_SYMPTOMS.iter().copied())
        .collect()
});

/// Extract symptoms with the built-in tables
pub fn extract(raw_text: &str) -> ExtractedSymptoms {
    DEFAULT_EXTRACTOR.extract(raw_text)
}

/// Whether a token is a canonical symptom name rather than a generic word
pub fn is_known_symptom(token: &str) -> bool {
    KNOWN_SYMPTOMS.contains(token)
}

/// Table-driven symptom extractor
pub struct SymptomExtractor {
    /// Phrases as word sequences, longest first
    phrases: Vec<(Vec<&'static str>, &'static str)>,
    stop_words: HashSet<&'static str>,
}

impl Default for SymptomExtractor {
    fn default() -> Self {
        let mut phrases: Vec<(Vec<&'static str>, &'static str)> = PHRASES
            .iter()
            .map(|(phrase, canonical)| (phrase.split_whitespace().collect(), *canonical))
            .collect();
        phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            phrases,
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }
}

impl SymptomExtractor {
    /// Extract normalized symptom tokens and vital hints
    pub fn extract(&self, raw_text: &str) -> ExtractedSymptoms {
        let lowered = raw_text.to_lowercase().replace('’', "'");

        let temperature_c = parse_temperature(&lowered);
        let duration_days = parse_duration(&lowered);

        let stripped = TEMPERATURE_WITH_UNIT.replace_all(&lowered, " ");
        let stripped = DURATION.replace_all(&stripped, " ");

        let normalized: String = stripped
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
            .collect();
        let words: Vec<&str> = normalized
            .split_whitespace()
            .map(|w| w.trim_matches('\''))
            .filter(|w| !w.is_empty())
            .collect();

        let mut tokens = Vec::new();
        let mut i = 0;
        while i < words.len() {
            if let Some((len, canonical)) = self.match_phrase(&words[i..]) {
                tokens.push(canonical.to_string());
                i += len;
                continue;
            }

            let word = words[i];
            i += 1;

            if self.stop_words.contains(word) || !word.chars().all(|c| c.is_alphabetic() || c == '\'') {
                continue;
            }
            if let Some((_, canonical)) = SYNONYMS.iter().find(|(synonym, _)| *synonym == word) {
                tokens.push(canonical.to_string());
            } else if word.chars().count() >= 2 && !word.contains('\'') {
                tokens.push(word.to_string());
            }
        }

        let symptoms = ExtractedSymptoms::new(tokens, temperature_c, duration_days);
        debug!(
            "Extracted {} symptom tokens (temperature={:?}, duration_days={:?})",
            symptoms.len(),
            symptoms.temperature_c(),
            symptoms.duration_days()
        );
        symptoms
    }

    fn match_phrase(&self, words: &[&str]) -> Option<(usize, &'static str)> {
        self.phrases.iter().find_map(|(phrase, canonical)| {
            (words.len() >= phrase.len() && words[..phrase.len()] == phrase[..])
                .then_some((phrase.len(), *canonical))
        })
    }
}

/// Highest plausible body temperature mentioned, in Celsius
fn parse_temperature(text: &str) -> Option<f32> {
    let with_unit = TEMPERATURE_WITH_UNIT.captures_iter(text).filter_map(|caps| {
        let value: f32 = caps[1].parse().ok()?;
        let fahrenheit = caps[2].starts_with('f');
        Some(if fahrenheit { to_celsius(value) } else { value })
    });
    let labeled = TEMPERATURE_LABELED.captures_iter(text).filter_map(|caps| {
        let value: f32 = caps[1].parse().ok()?;
        Some(if value > 50.0 { to_celsius(value) } else { value })
    });

    with_unit
        .chain(labeled)
        .filter(|celsius| (30.0..=45.0).contains(celsius))
        .fold(None, |max: Option<f32>, t| Some(max.map_or(t, |m| m.max(t))))
}

/// Longest duration mentioned, in days
fn parse_duration(text: &str) -> Option<u32> {
    DURATION
        .captures_iter(text)
        .filter_map(|caps| {
            let amount = match &caps[1] {
                "a" | "an" | "one" => 1,
                "two" => 2,
                "three" => 3,
                "four" => 4,
                "five" => 5,
                "six" => 6,
                "seven" => 7,
                "eight" => 8,
                "nine" => 9,
                "ten" => 10,
                digits => digits.parse::<u32>().ok()?,
            };
            let unit_days = match &caps[2] {
                unit if unit.starts_with("week") => 7,
                unit if unit.starts_with("month") => 30,
                _ => 1,
            };
            amount.checked_mul(unit_days)
        })
        .max()
}

fn to_celsius(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chest_pain_phrase() {
        let s = extract("Chest pain radiating to left arm");
        assert_eq!(s.tokens(), &["chest pain", "radiating", "left", "arm"]);
    }

    #[test]
    fn test_fever_vitals() {
        let s = extract("fever for 4 days, 39.5C");
        assert_eq!(s.tokens(), &["fever"]);
        assert_eq!(s.duration_days(), Some(4));
        assert_eq!(s.temperature_c(), Some(39.5));
    }

    #[test]
    fn test_fahrenheit_conversion() {
        let s = extract("temperature of 103 F since yesterday");
        let t = s.temperature_c().unwrap();
        assert!((t - 39.44).abs() < 0.01);

        let s = extract("my temp is 102.2");
        assert!((s.temperature_c().unwrap() - 39.0).abs() < 0.01);
    }

    #[test]
    fn test_implausible_temperature_ignored() {
        let s = extract("fever 10 days");
        assert_eq!(s.temperature_c(), None);
        assert_eq!(s.duration_days(), Some(10));
    }

    #[test]
    fn test_duration_words() {
        assert_eq!(extract("cough for two weeks").duration_days(), Some(14));
        assert_eq!(extract("headache for a day").duration_days(), Some(1));
    }

    #[test]
    fn test_synonyms_and_stop_words() {
        let s = extract("I have a mild headache and tiredness");
        assert_eq!(s.tokens(), &["mild", "headache", "fatigue"]);
    }

    #[test]
    fn test_breathing_phrases() {
        assert_eq!(extract("I can't breathe").tokens(), &["shortness of breath"]);
        assert_eq!(extract("short of breath, wheezing").tokens(), &["shortness of breath", "wheezing"]);
    }

    #[test]
    fn test_neurological_phrases() {
        let s = extract("Sudden slurred speech and face drooping, weakness on one side");
        assert_eq!(s.tokens(), &["sudden", "slurred speech", "facial droop", "one-sided weakness"]);
    }

    #[test]
    fn test_empty_when_nothing_recognizable() {
        assert!(extract("the and of it").is_empty());
        assert!(extract("!!! 123 ???").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_dedup_keeps_first_order() {
        let s = extract("cough, coughing and more cough");
        assert_eq!(s.tokens(), &["cough", "more"]);
    }

    #[test]
    fn test_known_symptoms() {
        assert!(is_known_symptom("fatigue"));
        assert!(is_known_symptom("chest pain"));
        assert!(!is_known_symptom("mild"));
    }
}
