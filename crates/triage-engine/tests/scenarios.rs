//! End-to-end triage scenarios over the built-in corpus and graph

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use triage_core::error::{Error, Result};
use triage_core::graph::{GraphSearch, SymptomGraph};
use triage_core::knowledge::KnowledgeBase;
use triage_core::models::{GraphMatch, KnowledgeMatch, ResolutionPath, SymptomQuery, UrgencyLevel};
use triage_core::source::{EvidenceRequest, EvidenceSource};
use triage_engine::synthesis::{EMERGENCY_WARNING, SAFE_DEFAULT_CONFIDENCE};
use triage_engine::{
    EngineSettings, FixedClock, GraphSource, HistorySink, JsonlHistory, KnowledgeSource,
    TriageEngine, TriageEngineBuilder, CHAT_APOLOGY,
};
use triage_llm::{CompletionParams, HashingEmbedder, LLMClient, Message};
use triage_search::{KnowledgeIndex, KnowledgeSearch};

/// Replies with a fixed text and counts calls
struct ScriptedLlm {
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LLMClient for ScriptedLlm {
    async fn complete(&self, _messages: &[Message], _params: &CompletionParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

struct DownLlm;

#[async_trait]
impl LLMClient for DownLlm {
    async fn complete(&self, _messages: &[Message], _params: &CompletionParams) -> Result<String> {
        Err(Error::unavailable("connection refused"))
    }

    fn provider_name(&self) -> &str {
        "down"
    }
}

/// A source whose backend is unreachable
struct DownSource<T>(PhantomData<fn() -> T>);

#[async_trait]
impl<T: Send + 'static> EvidenceSource for DownSource<T> {
    type Output = T;

    fn name(&self) -> &'static str {
        "down"
    }

    async fn query(&self, _request: &EvidenceRequest<'_>) -> Result<T> {
        Err(Error::IndexUnavailable("connection refused".to_string()))
    }
}

fn down<T: Send + 'static>() -> Arc<DownSource<T>> {
    Arc::new(DownSource(PhantomData))
}

/// A graph that never answers in time
struct StalledGraph;

#[async_trait]
impl EvidenceSource for StalledGraph {
    type Output = Vec<GraphMatch>;

    fn name(&self) -> &'static str {
        "graph"
    }

    async fn query(&self, _request: &EvidenceRequest<'_>) -> Result<Vec<GraphMatch>> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(Vec::new())
    }
}

async fn builtin_sources() -> (KnowledgeSource, GraphSource) {
    let embedder = Arc::new(HashingEmbedder::new(384).unwrap());
    let index = KnowledgeIndex::build(Arc::new(KnowledgeBase::builtin()), embedder)
        .await
        .unwrap();
    let knowledge: KnowledgeSource =
        Arc::new(KnowledgeSearch::new(Arc::new(index), 3).with_min_similarity(0.1));
    let graph: GraphSource = Arc::new(GraphSearch::new(Arc::new(SymptomGraph::builtin()), 5));
    (knowledge, graph)
}

async fn builtin_engine() -> TriageEngineBuilder {
    let (knowledge, graph) = builtin_sources().await;
    TriageEngine::builder()
        .knowledge(knowledge)
        .graph(graph)
        .clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        )))
}

fn assessment(urgency: &str, confidence: f32, advice: &str) -> String {
    format!(
        "```json\n{{\"urgency_level\": \"{urgency}\", \"confidence\": {confidence}, \"advice\": \"{advice}\"}}\n```"
    )
}

#[tokio::test]
async fn test_cardiac_emergency_with_reasoning() {
    let llm = ScriptedLlm::new(assessment("EMERGENCY", 0.9, "Call emergency services now."));
    let client: Arc<dyn LLMClient> = llm.clone();
    let engine = builtin_engine().await.llm(client).build().unwrap();

    let query = SymptomQuery::new("chest pain radiating to left arm").with_age(45);
    let result = engine.triage(&query).await;

    assert_eq!(result.urgency_level, UrgencyLevel::Emergency);
    assert!((0.85..=0.95).contains(&result.confidence), "{}", result.confidence);
    assert_eq!(result.resolution, ResolutionPath::FullSynthesis);
    assert_eq!(result.advice, "Call emergency services now.");
    assert!(result.detected_symptoms.contains(&"chest pain".to_string()));
    assert!(result.sources.knowledge && result.sources.graph && result.sources.reasoning);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cardiac_emergency_without_reasoning() {
    let engine = builtin_engine().await.build().unwrap();
    let query = SymptomQuery::new("chest pain radiating to left arm").with_age(45);
    let result = engine.triage(&query).await;

    assert_eq!(result.urgency_level, UrgencyLevel::Emergency);
    assert!((0.85..=0.95).contains(&result.confidence));
    assert_eq!(result.resolution, ResolutionPath::EvidenceFallback);
    assert!(!result.sources.reasoning);
    assert!(result.advice.contains("reduced evidence"));
}

#[tokio::test]
async fn test_pattern_emergency_overrides_a_calm_model() {
    let llm: Arc<dyn LLMClient> =
        ScriptedLlm::new(assessment("SELF-CARE", 0.95, "Rest and drink water."));
    let engine = builtin_engine().await.llm(llm).build().unwrap();

    let result = engine
        .triage(&SymptomQuery::new("chest pain radiating to left arm"))
        .await;
    assert_eq!(result.urgency_level, UrgencyLevel::Emergency);
    assert!(result.advice.starts_with(EMERGENCY_WARNING));
    assert!((0.85..=0.95).contains(&result.confidence));
}

#[tokio::test]
async fn test_persistent_fever_needs_consultation() {
    let llm: Arc<dyn LLMClient> = ScriptedLlm::new(
        "Urgency level: MODERATE. Please see a doctor within 24 hours. Confidence: 80%",
    );
    let engine = builtin_engine().await.llm(llm).build().unwrap();
    let result = engine.triage(&SymptomQuery::new("fever for 4 days, 39.5C")).await;

    assert_eq!(result.urgency_level, UrgencyLevel::Consultation);
    assert!((0.70..=0.85).contains(&result.confidence), "{}", result.confidence);
    assert_eq!(result.resolution, ResolutionPath::FullSynthesis);

    let offline = builtin_engine().await.build().unwrap();
    let result = offline.triage(&SymptomQuery::new("fever for 4 days, 39.5C")).await;
    assert_eq!(result.urgency_level, UrgencyLevel::Consultation);
    assert!((0.70..=0.85).contains(&result.confidence));
    assert_eq!(result.resolution, ResolutionPath::EvidenceFallback);
}

#[tokio::test]
async fn test_mild_headache_is_self_care() {
    let llm: Arc<dyn LLMClient> =
        ScriptedLlm::new(assessment("LOW", 0.7, "Rest, hydrate and take a mild pain reliever."));
    let engine = builtin_engine().await.llm(llm).build().unwrap();
    let result = engine.triage(&SymptomQuery::new("mild headache and tiredness")).await;

    assert_eq!(result.urgency_level, UrgencyLevel::SelfCare);
    assert!((0.60..=0.75).contains(&result.confidence), "{}", result.confidence);

    let offline = builtin_engine().await.build().unwrap();
    let result = offline.triage(&SymptomQuery::new("mild headache and tiredness")).await;
    assert_eq!(result.urgency_level, UrgencyLevel::SelfCare);
    assert!((0.60..=0.75).contains(&result.confidence));
}

#[tokio::test]
async fn test_everything_down_returns_safe_default() {
    let knowledge: KnowledgeSource = down::<Vec<KnowledgeMatch>>();
    let graph: GraphSource = down::<Vec<GraphMatch>>();
    let llm: Arc<dyn LLMClient> = Arc::new(DownLlm);
    let engine = TriageEngine::builder()
        .knowledge(knowledge)
        .graph(graph)
        .llm(llm)
        .build()
        .unwrap();

    let result = engine.triage(&SymptomQuery::new("cough")).await;
    assert_eq!(result.urgency_level, UrgencyLevel::Consultation);
    assert_eq!(result.confidence, SAFE_DEFAULT_CONFIDENCE);
    assert_eq!(result.resolution, ResolutionPath::SafeDefault);
    assert!(result.advice.contains("reduced evidence"));
    assert!(!result.sources.knowledge && !result.sources.graph && !result.sources.reasoning);
}

#[tokio::test]
async fn test_unparseable_reasoning_falls_back_to_evidence() {
    let llm: Arc<dyn LLMClient> = ScriptedLlm::new("I am not sure what to say.");
    let engine = builtin_engine().await.llm(llm).build().unwrap();
    let result = engine.triage(&SymptomQuery::new("runny nose and sore throat")).await;

    assert_eq!(result.resolution, ResolutionPath::EvidenceFallback);
    assert_eq!(result.urgency_level, UrgencyLevel::SelfCare);
    assert!(!result.sources.reasoning);
}

#[tokio::test]
async fn test_stalled_source_is_bounded_by_timeout() {
    let (knowledge, _) = builtin_sources().await;
    let graph: GraphSource = Arc::new(StalledGraph);
    let settings = EngineSettings {
        source_timeout: Duration::from_millis(200),
        ..EngineSettings::default()
    };
    let engine = TriageEngine::builder()
        .knowledge(knowledge)
        .graph(graph)
        .settings(settings)
        .build()
        .unwrap();

    let started = Instant::now();
    let result = engine
        .triage(&SymptomQuery::new("chest pain radiating to left arm"))
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(result.sources.knowledge);
    assert!(!result.sources.graph);
    assert_eq!(result.urgency_level, UrgencyLevel::Emergency);
}

#[tokio::test]
async fn test_identical_requests_give_identical_results() {
    let llm: Arc<dyn LLMClient> = ScriptedLlm::new(assessment("CONSULTATION", 0.6, "See a GP."));
    let engine = builtin_engine().await.llm(llm).build().unwrap();

    let query = SymptomQuery::new("cough and fever for a week").with_allergies("penicillin");
    let first = engine.triage(&query).await;
    let second = engine.triage(&query).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_every_result_is_appended_to_history() {
    let dir = TempDir::new().unwrap();
    let history = Arc::new(JsonlHistory::new(dir.path().join("history.jsonl")));
    let sink: Arc<dyn HistorySink> = history.clone();
    let engine = Arc::new(builtin_engine().await.history(sink).build().unwrap());

    let tasks: Vec<_> = ["headache", "runny nose and cough", "difficulty breathing", "rash"]
        .into_iter()
        .map(|text| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.triage(&SymptomQuery::new(text)).await })
        })
        .collect();
    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    let entries = history.load().await.unwrap();
    assert_eq!(entries.len(), 4);
    for entry in entries {
        assert!(results.contains(&entry.result));
    }
}

#[tokio::test]
async fn test_results_stay_within_their_band() {
    let engine = builtin_engine().await.build().unwrap();
    for text in [
        "slurred speech and facial droop",
        "the cut on my hand is red and swollen with pus",
        "constant tiredness",
        "stomach ache and vomiting",
        "",
        "asdf qwerty",
    ] {
        let result = engine.triage(&SymptomQuery::new(text)).await;
        assert!(
            result.urgency_level.band().contains(result.confidence),
            "{text:?} gave {} at {}",
            result.urgency_level,
            result.confidence
        );
        assert_ne!(result.resolution, ResolutionPath::SafeDefault);
    }
}

#[tokio::test]
async fn test_chat_passes_answers_through() {
    let llm: Arc<dyn LLMClient> = ScriptedLlm::new("Paracetamol can help with fever.");
    let engine = TriageEngine::builder().llm(llm).build().unwrap();
    assert_eq!(
        engine.chat("What helps with fever?").await,
        "Paracetamol can help with fever."
    );

    let context = [Message::user("I have a fever"), Message::assistant("How high is it?")];
    assert_eq!(
        engine.chat_with_context("About 38.5", &context).await,
        "Paracetamol can help with fever."
    );

    let llm: Arc<dyn LLMClient> = Arc::new(DownLlm);
    let engine = TriageEngine::builder().llm(llm).build().unwrap();
    assert_eq!(engine.chat("What helps with fever?").await, CHAT_APOLOGY);
}
