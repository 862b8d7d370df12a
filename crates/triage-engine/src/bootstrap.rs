//! Wiring a configured engine from data files and services

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use triage_core::error::Result;
use triage_core::graph::{GraphSearch, GraphStats, SymptomGraph};
use triage_core::knowledge::KnowledgeBase;
use triage_llm::{create_embedder, LLMClient, OllamaClient};
use triage_search::{KnowledgeIndex, KnowledgeSearch};

use crate::config::TriageConfig;
use crate::engine::{GraphSource, KnowledgeSource, TriageEngine};
use crate::history::{HistorySink, JsonlHistory};
use crate::monitoring::{LogMonitor, MetricsMonitor, MonitoringSink};

/// A ready engine plus the collaborators it was built from
pub struct TriageSystem {
    /// The engine
    pub engine: TriageEngine,
    /// Embedded corpus; `None` when embedding failed at startup
    pub knowledge: Option<Arc<KnowledgeIndex>>,
    /// Symptom-condition graph
    pub graph: Arc<SymptomGraph>,
    /// Reasoning service; `None` when offline
    pub ollama: Option<Arc<OllamaClient>>,
}

/// What `doctor` reports
#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    /// Indexed knowledge records
    pub knowledge_records: usize,
    /// Graph sizes
    pub graph: GraphStats,
    /// Configured reasoning model
    pub model: Option<String>,
    /// Model installed and reachable
    pub model_available: bool,
}

impl TriageSystem {
    /// Load data and connect services as configured.
    ///
    /// Unreadable data files are errors. An embedder that cannot index the
    /// corpus is not: the engine starts without the similarity source and
    /// resolves through the remaining paths.
    pub async fn bootstrap(config: &TriageConfig) -> Result<Self> {
        let base = match &config.data.knowledge_file {
            Some(path) => KnowledgeBase::from_json_file(path)?,
            None => KnowledgeBase::builtin(),
        };
        let graph = Arc::new(match &config.data.graph_file {
            Some(path) => SymptomGraph::from_json_file(path)?,
            None => SymptomGraph::builtin(),
        });

        let embedder = create_embedder(&config.embedder)?;
        let knowledge = match KnowledgeIndex::build(Arc::new(base), embedder).await {
            Ok(index) => Some(Arc::new(index)),
            Err(e) => {
                warn!("Knowledge index unavailable: {}", e);
                None
            }
        };

        let settings = config.engine.clone();
        let mut builder = TriageEngine::builder().settings(settings.clone());

        if let Some(index) = &knowledge {
            let source: KnowledgeSource = Arc::new(
                KnowledgeSearch::new(index.clone(), settings.top_k)
                    .with_min_similarity(settings.min_similarity),
            );
            builder = builder.knowledge(source);
        }
        let graph_source: GraphSource = Arc::new(GraphSearch::new(graph.clone(), settings.graph_limit));
        builder = builder.graph(graph_source);

        let ollama = if config.offline {
            info!("Offline mode, reasoning service disabled");
            None
        } else {
            Some(Arc::new(OllamaClient::new(config.ollama.clone())?))
        };
        if let Some(client) = &ollama {
            let llm: Arc<dyn LLMClient> = client.clone();
            builder = builder.llm(llm);
        }

        if let Some(path) = &config.data.history_file {
            let history: Arc<dyn HistorySink> = Arc::new(JsonlHistory::new(path.clone()));
            builder = builder.history(history);
        }
        let metrics: Arc<dyn MonitoringSink> = Arc::new(MetricsMonitor);
        let log: Arc<dyn MonitoringSink> = Arc::new(LogMonitor);
        builder = builder.monitor(metrics).monitor(log);

        let engine = builder.build()?;
        info!(
            "Triage engine ready: {} knowledge records, reasoning {}",
            knowledge.as_ref().map_or(0, |k| k.len()),
            if ollama.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            engine,
            knowledge,
            graph,
            ollama,
        })
    }

    /// Sizes of the loaded data and reachability of the model
    pub async fn report(&self) -> SystemReport {
        let model_available = match &self.ollama {
            Some(client) => match client.model_available().await {
                Ok(available) => available,
                Err(e) => {
                    warn!("Reasoning service check failed: {}", e);
                    false
                }
            },
            None => false,
        };

        SystemReport {
            knowledge_records: self.knowledge.as_ref().map_or(0, |k| k.len()),
            graph: self.graph.stats(),
            model: self.ollama.as_ref().map(|c| c.config().model.clone()),
            model_available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use triage_core::models::{ResolutionPath, SymptomQuery, UrgencyLevel};

    fn offline_config() -> TriageConfig {
        TriageConfig {
            offline: true,
            ..TriageConfig::default()
        }
    }

    #[tokio::test]
    async fn test_offline_bootstrap_with_builtin_data() {
        let system = TriageSystem::bootstrap(&offline_config()).await.unwrap();
        let report = system.report().await;

        assert_eq!(report.knowledge_records, 12);
        assert!(report.graph.relationships > 0);
        assert!(report.model.is_none());
        assert!(!report.model_available);

        let result = system
            .engine
            .triage(&SymptomQuery::new("chest pain radiating to left arm"))
            .await;
        assert_eq!(result.urgency_level, UrgencyLevel::Emergency);
        assert_eq!(result.resolution, ResolutionPath::EvidenceFallback);
    }

    #[tokio::test]
    async fn test_history_file_is_written() {
        let dir = TempDir::new().unwrap();
        let mut config = offline_config();
        config.data.history_file = Some(dir.path().join("history.jsonl"));

        let system = TriageSystem::bootstrap(&config).await.unwrap();
        system.engine.triage(&SymptomQuery::new("runny nose")).await;

        let history = JsonlHistory::new(dir.path().join("history.jsonl"));
        let entries = history.load().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].query.text, "runny nose");
    }

    #[tokio::test]
    async fn test_missing_knowledge_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut config = offline_config();
        config.data.knowledge_file = Some(dir.path().join("absent.json"));
        assert!(TriageSystem::bootstrap(&config).await.is_err());
    }
}
