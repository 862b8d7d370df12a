//! Triage Engine - symptom triage with a deterministic fallback chain
//!
//! This crate provides:
//! - The decision engine: evidence retrieval, pattern matching, reasoning and synthesis
//! - The chat assistant
//! - History and monitoring sinks
//! - Configuration and wiring from data files and services

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod assistant;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod engine;
pub mod history;
pub mod monitoring;
pub mod parsing;
pub mod synthesis;

pub use assistant::{ChatAssistant, CHAT_APOLOGY};
pub use bootstrap::{SystemReport, TriageSystem};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{DataSettings, EngineSettings, TriageConfig, ENV_PREFIX};
pub use engine::{GraphSource, KnowledgeSource, TriageEngine, TriageEngineBuilder};
pub use history::{HistoryEntry, HistorySink, JsonlHistory};
pub use monitoring::{LogMonitor, MetricsMonitor, MonitoringSink, TriageEvent};
pub use parsing::parse_reasoning;
