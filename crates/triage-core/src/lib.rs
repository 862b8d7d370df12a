//! Triage Core - shared building blocks of the symptom triage engine
//!
//! This crate provides:
//! - The urgency scale, confidence bands and result types
//! - Symptom extraction from free text
//! - The ordered pattern table used when the reasoning service is down
//! - The knowledge corpus and the symptom-condition graph
//! - Error types and configuration loading

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod extraction;
pub mod graph;
pub mod knowledge;
pub mod models;
pub mod patterns;
pub mod source;

pub use error::Error;
pub use error::Result;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result, TriageFailure};
    pub use crate::extraction::{extract, SymptomExtractor};
    pub use crate::graph::{GraphSearch, GraphStats, SymptomGraph};
    pub use crate::knowledge::{KnowledgeBase, KnowledgeRecord};
    pub use crate::models::{
        ConfidenceBand, EvidenceBundle, ExtractedSymptoms, GraphMatch, KnowledgeMatch,
        ReasoningOutput, ResolutionPath, SourceFlags, SymptomQuery, TriageResult, UrgencyLevel,
    };
    pub use crate::patterns::{PatternMatch, PatternMatcher};
    pub use crate::source::{EvidenceRequest, EvidenceSource};
}
