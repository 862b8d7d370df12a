//! The triage decision engine

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use triage_core::error::{Error, Result, TriageFailure};
use triage_core::extraction::SymptomExtractor;
use triage_core::models::{
    EvidenceBundle, GraphMatch, KnowledgeMatch, ReasoningOutput, SymptomQuery, TriageResult,
};
use triage_core::patterns::{PatternMatch, PatternMatcher};
use triage_core::source::{EvidenceRequest, EvidenceSource};
use triage_llm::{CompletionParams, LLMClient, Message};
use triage_prompts::{PromptEngine, TriagePromptContext, TRIAGE_SYSTEM_PROMPT};

use crate::assistant::ChatAssistant;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineSettings;
use crate::history::{HistoryEntry, HistorySink};
use crate::monitoring::{MonitoringSink, TriageEvent};
use crate::parsing::parse_reasoning;
use crate::synthesis;

/// Similarity source handle
pub type KnowledgeSource = Arc<dyn EvidenceSource<Output = Vec<KnowledgeMatch>>>;

/// Graph source handle
pub type GraphSource = Arc<dyn EvidenceSource<Output = Vec<GraphMatch>>>;

/// Turns a symptom description into a triage result.
///
/// Every collaborator is optional. A missing or failing collaborator moves
/// the request further down the fallback chain instead of failing it, so
/// [`TriageEngine::triage`] always returns a result.
pub struct TriageEngine {
    knowledge: Option<KnowledgeSource>,
    graph: Option<GraphSource>,
    llm: Option<Arc<dyn LLMClient>>,
    history: Option<Arc<dyn HistorySink>>,
    monitors: Vec<Arc<dyn MonitoringSink>>,
    clock: Arc<dyn Clock>,
    prompts: PromptEngine,
    extractor: SymptomExtractor,
    patterns: PatternMatcher,
    assistant: ChatAssistant,
    settings: EngineSettings,
}

/// Builder for [`TriageEngine`]
pub struct TriageEngineBuilder {
    knowledge: Option<KnowledgeSource>,
    graph: Option<GraphSource>,
    llm: Option<Arc<dyn LLMClient>>,
    history: Option<Arc<dyn HistorySink>>,
    monitors: Vec<Arc<dyn MonitoringSink>>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl Default for TriageEngineBuilder {
    fn default() -> Self {
        Self {
            knowledge: None,
            graph: None,
            llm: None,
            history: None,
            monitors: Vec::new(),
            clock: Arc::new(SystemClock),
            settings: EngineSettings::default(),
        }
    }
}

impl TriageEngineBuilder {
    /// Similarity search over the knowledge corpus
    pub fn knowledge(mut self, source: KnowledgeSource) -> Self {
        self.knowledge = Some(source);
        self
    }

    /// Symptom-condition graph
    pub fn graph(mut self, source: GraphSource) -> Self {
        self.graph = Some(source);
        self
    }

    /// Reasoning service, also used for chat
    pub fn llm(mut self, llm: Arc<dyn LLMClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Where finished results are appended
    pub fn history(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.history = Some(sink);
        self
    }

    /// Add a monitoring sink
    pub fn monitor(mut self, sink: Arc<dyn MonitoringSink>) -> Self {
        self.monitors.push(sink);
        self
    }

    /// Timestamp source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Timeouts and search tuning
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Finish the engine
    pub fn build(self) -> Result<TriageEngine> {
        let assistant = ChatAssistant::new(self.llm.clone(), self.settings.chat_timeout);
        let prompts = PromptEngine::new()
            .map_err(|e| Error::Configuration(format!("Failed to load prompt templates: {e}")))?;
        Ok(TriageEngine {
            knowledge: self.knowledge,
            graph: self.graph,
            llm: self.llm,
            history: self.history,
            monitors: self.monitors,
            clock: self.clock,
            prompts,
            extractor: SymptomExtractor::default(),
            patterns: PatternMatcher::default(),
            assistant,
            settings: self.settings,
        })
    }
}

impl TriageEngine {
    /// Start configuring an engine
    pub fn builder() -> TriageEngineBuilder {
        TriageEngineBuilder::default()
    }

    /// Settings in effect
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Whether a reasoning service is configured and reports healthy
    pub async fn reasoning_available(&self) -> bool {
        match &self.llm {
            Some(llm) => llm.health_check().await,
            None => false,
        }
    }

    /// Assess a symptom description. Never fails: each failing stage moves
    /// the request to the next path of the fallback chain.
    #[instrument(skip(self, query), fields(chars = query.text.len()))]
    pub async fn triage(&self, query: &SymptomQuery) -> TriageResult {
        let started = Instant::now();

        let symptoms = self.extractor.extract(&query.text);
        debug!("Extracted symptoms: {:?}", symptoms.tokens());

        let request = EvidenceRequest {
            raw_text: &query.text,
            symptoms: &symptoms,
        };
        let budget = self.settings.source_timeout;
        let (knowledge, graph) = tokio::join!(
            gather("knowledge", self.knowledge.as_deref(), &request, budget),
            gather("graph", self.graph.as_deref(), &request, budget),
        );
        let bundle = EvidenceBundle::new(symptoms.clone(), knowledge.ok(), graph.ok());

        let pattern = self.match_pattern(&bundle);
        let reasoning = self.reason(query, &bundle).await;
        let reasoning_ok = reasoning.is_ok();

        let decision = synthesis::compose(&bundle, pattern, reasoning);
        let result = TriageResult {
            urgency_level: decision.urgency,
            confidence: decision.confidence,
            advice: decision.advice,
            detected_symptoms: bundle.symptoms().tokens().to_vec(),
            timestamp: self.clock.now(),
            sources: bundle.source_flags(reasoning_ok),
            resolution: decision.resolution,
        };

        info!(
            urgency = %result.urgency_level,
            confidence = result.confidence,
            resolution = ?result.resolution,
            "Triage resolved"
        );

        self.report(query, &result, started.elapsed()).await;
        result
    }

    /// Answer a standalone question
    pub async fn chat(&self, question: &str) -> String {
        self.assistant.chat(question).await
    }

    /// Answer a question after prior conversation turns
    pub async fn chat_with_context(&self, question: &str, context: &[Message]) -> String {
        self.assistant.chat_with_context(question, context).await
    }

    fn match_pattern(
        &self,
        bundle: &EvidenceBundle,
    ) -> std::result::Result<PatternMatch, TriageFailure> {
        self.patterns
            .evaluate(bundle.symptoms())
            .ok_or(TriageFailure::InsufficientEvidence)
    }

    async fn reason(
        &self,
        query: &SymptomQuery,
        bundle: &EvidenceBundle,
    ) -> std::result::Result<ReasoningOutput, TriageFailure> {
        let Some(llm) = &self.llm else {
            return Err(TriageFailure::unavailable("reasoning", "not configured"));
        };

        let prompt = self
            .prompts
            .triage_assessment(&TriagePromptContext::new(query, bundle))
            .map_err(|e| {
                TriageFailure::unavailable("reasoning", format!("prompt rendering failed: {e}"))
            })?;
        let messages = [Message::system(TRIAGE_SYSTEM_PROMPT), Message::user(prompt)];
        let params = CompletionParams::structured();

        let budget = self.settings.reasoning_timeout;
        let text = match tokio::time::timeout(budget, llm.complete(&messages, &params)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Reasoning service {} failed: {}", llm.provider_name(), e);
                return Err(TriageFailure::unavailable("reasoning", e.to_string()));
            }
            Err(_) => {
                warn!("Reasoning service timed out after {:?}", budget);
                return Err(TriageFailure::unavailable(
                    "reasoning",
                    format!("timed out after {budget:?}"),
                ));
            }
        };

        parse_reasoning(&text).map_err(|failure| {
            warn!("Unusable reasoning output: {}", failure);
            failure
        })
    }

    async fn report(&self, query: &SymptomQuery, result: &TriageResult, latency: Duration) {
        let event = TriageEvent::new(result, latency);
        for monitor in &self.monitors {
            if let Err(e) = monitor.record(&event) {
                warn!("Monitoring sink failed: {}", e);
            }
        }

        let Some(history) = &self.history else {
            return;
        };
        let entry = HistoryEntry {
            query: query.clone(),
            result: result.clone(),
        };
        match tokio::time::timeout(self.settings.sink_timeout, history.append(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("History sink failed: {}", e),
            Err(_) => warn!("History sink timed out after {:?}", self.settings.sink_timeout),
        }
    }
}

/// Query one source within `budget`, folding every failure into a
/// [`TriageFailure`]
async fn gather<T: Send>(
    label: &'static str,
    source: Option<&dyn EvidenceSource<Output = T>>,
    request: &EvidenceRequest<'_>,
    budget: Duration,
) -> std::result::Result<T, TriageFailure> {
    let Some(source) = source else {
        debug!("No {} source configured", label);
        return Err(TriageFailure::unavailable(label, "not configured"));
    };

    let attempt = async {
        if !source.is_available().await {
            return Err(TriageFailure::unavailable(source.name(), "reported unavailable"));
        }
        source
            .query(request)
            .await
            .map_err(|e| TriageFailure::unavailable(source.name(), e.to_string()))
    };

    let outcome = match tokio::time::timeout(budget, attempt).await {
        Ok(outcome) => outcome,
        Err(_) => Err(TriageFailure::unavailable(
            source.name(),
            format!("timed out after {budget:?}"),
        )),
    };
    if let Err(failure) = &outcome {
        warn!("Evidence source skipped: {}", failure);
    }
    outcome
}
