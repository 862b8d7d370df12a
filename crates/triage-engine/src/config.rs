//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use triage_core::config::{
    duration_ms, path_override, ConfigError, ConfigLoader, ConfigValidation, EnvOverrides,
    EnvResolver,
};
use triage_llm::{EmbedderConfig, OllamaConfig};
use triage_search::DEFAULT_TOP_K;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TRIAGE";

/// Decision engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Budget for each evidence source, in milliseconds
    #[serde(with = "duration_ms")]
    pub source_timeout: Duration,
    /// Budget for the reasoning call, in milliseconds
    #[serde(with = "duration_ms")]
    pub reasoning_timeout: Duration,
    /// Budget for a chat answer, in milliseconds
    #[serde(with = "duration_ms")]
    pub chat_timeout: Duration,
    /// Budget for each history or monitoring report, in milliseconds
    #[serde(with = "duration_ms")]
    pub sink_timeout: Duration,
    /// Similarity matches per request
    pub top_k: usize,
    /// Similarity below which a record is not considered a match
    pub min_similarity: f32,
    /// Graph candidates per request
    pub graph_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(2),
            reasoning_timeout: Duration::from_secs(30),
            chat_timeout: Duration::from_secs(30),
            sink_timeout: Duration::from_secs(1),
            top_k: DEFAULT_TOP_K,
            min_similarity: 0.1,
            graph_limit: 5,
        }
    }
}

/// Where the corpus, the graph and the history live
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// JSON knowledge records; the built-in corpus when unset
    pub knowledge_file: Option<PathBuf>,
    /// JSON graph seed; the built-in graph when unset
    pub graph_file: Option<PathBuf>,
    /// JSON Lines history; no history when unset
    pub history_file: Option<PathBuf>,
}

/// Full configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Decision engine tuning
    pub engine: EngineSettings,
    /// Reasoning service
    pub ollama: OllamaConfig,
    /// Query and corpus embeddings
    pub embedder: EmbedderConfig,
    /// Data files
    pub data: DataSettings,
    /// Run without the reasoning service
    pub offline: bool,
}

impl TriageConfig {
    /// Load from an optional TOML/JSON file, then apply `TRIAGE_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        ConfigLoader::new(ENV_PREFIX).load(path)
    }
}

fn override_ms(env: &EnvResolver, key: &str, target: &mut Duration) -> Result<(), ConfigError> {
    if let Some(ms) = env.resolve_parse::<u64>(key)? {
        *target = Duration::from_millis(ms);
    }
    Ok(())
}

impl EnvOverrides for TriageConfig {
    fn apply_env(&mut self, env: &EnvResolver) -> Result<(), ConfigError> {
        override_ms(env, "source_timeout_ms", &mut self.engine.source_timeout)?;
        override_ms(env, "reasoning_timeout_ms", &mut self.engine.reasoning_timeout)?;
        override_ms(env, "chat_timeout_ms", &mut self.engine.chat_timeout)?;
        if let Some(top_k) = env.resolve_parse("top_k")? {
            self.engine.top_k = top_k;
        }
        if let Some(limit) = env.resolve_parse("graph_limit")? {
            self.engine.graph_limit = limit;
        }
        if let Some(min) = env.resolve_parse("min_similarity")? {
            self.engine.min_similarity = min;
        }

        if let Some(url) = env.resolve("ollama_url") {
            self.ollama.base_url = url.clone();
            self.embedder.base_url = url;
        }
        if let Some(model) = env.resolve("ollama_model") {
            self.ollama.model = model;
        }
        if let Some(provider) = env.resolve("embedder") {
            self.embedder.provider = provider
                .parse()
                .map_err(|e: triage_core::Error| ConfigError::Validation(e.to_string()))?;
        }
        if let Some(model) = env.resolve("embedding_model") {
            self.embedder.model = model;
        }
        if let Some(dimension) = env.resolve_parse("embedding_dimension")? {
            self.embedder.dimension = dimension;
        }

        path_override(env, "knowledge_file", &mut self.data.knowledge_file);
        path_override(env, "graph_file", &mut self.data.graph_file);
        path_override(env, "history_file", &mut self.data.history_file);

        if let Some(offline) = env.resolve_parse("offline")? {
            self.offline = offline;
        }
        Ok(())
    }
}

impl ConfigValidation for TriageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        for (name, value) in [
            ("source_timeout", engine.source_timeout),
            ("reasoning_timeout", engine.reasoning_timeout),
            ("chat_timeout", engine.chat_timeout),
            ("sink_timeout", engine.sink_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Validation(format!("{name} must be positive")));
            }
        }
        if engine.top_k == 0 || engine.graph_limit == 0 {
            return Err(ConfigError::Validation(
                "top_k and graph_limit must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&engine.min_similarity) {
            return Err(ConfigError::Validation(
                "min_similarity must be within [0, 1]".to_string(),
            ));
        }
        if self.embedder.dimension == 0 {
            return Err(ConfigError::Validation(
                "embedding dimension must be at least 1".to_string(),
            ));
        }
        if !self.offline && self.ollama.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("ollama base_url is empty".to_string()));
        }
        if self.ollama.rate_limit == 0 {
            return Err(ConfigError::Validation("ollama rate_limit must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;
    use triage_llm::EmbeddingProvider;

    fn load_with(env: EnvResolver, path: Option<&Path>) -> Result<TriageConfig, ConfigError> {
        ConfigLoader::with_resolver(env).load(path)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = load_with(EnvResolver::new("TRIAGE_TEST_DEFAULTS"), None).unwrap();
        assert_eq!(config.engine.top_k, 3);
        assert_eq!(config.ollama.model, "llama3.2");
        assert_eq!(config.embedder.provider, EmbeddingProvider::Hashing);
        assert!(config.data.history_file.is_none());
    }

    #[test]
    fn test_toml_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
offline = true

[engine]
source_timeout = 750
top_k = 5

[embedder]
provider = "ollama"
model = "all-minilm"

[data]
history_file = "/var/lib/triage/history.jsonl"
"#
        )
        .unwrap();

        let config = load_with(EnvResolver::new("TRIAGE_TEST_TOML"), Some(file.path())).unwrap();
        assert!(config.offline);
        assert_eq!(config.engine.source_timeout, Duration::from_millis(750));
        assert_eq!(config.engine.top_k, 5);
        assert_eq!(config.engine.graph_limit, 5);
        assert_eq!(config.embedder.provider, EmbeddingProvider::Ollama);
        assert_eq!(
            config.data.history_file,
            Some(PathBuf::from("/var/lib/triage/history.jsonl"))
        );
    }

    #[test]
    fn test_env_overrides() {
        let env = EnvResolver::new("TRIAGE_TEST_ENV")
            .with_value("ollama_url", "http://gpu-box:11434")
            .with_value("reasoning_timeout_ms", "5000")
            .with_value("embedder", "ollama")
            .with_value("offline", "true");
        let config = load_with(env, None).unwrap();

        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");
        assert_eq!(config.embedder.base_url, "http://gpu-box:11434");
        assert_eq!(config.engine.reasoning_timeout, Duration::from_secs(5));
        assert_eq!(config.embedder.provider, EmbeddingProvider::Ollama);
        assert!(config.offline);
    }

    #[test]
    fn test_validation() {
        let env = EnvResolver::new("TRIAGE_TEST_INVALID").with_value("top_k", "0");
        assert!(matches!(load_with(env, None), Err(ConfigError::Validation(_))));

        let env = EnvResolver::new("TRIAGE_TEST_INVALID").with_value("embedder", "word2vec");
        assert!(matches!(load_with(env, None), Err(ConfigError::Validation(_))));

        let env = EnvResolver::new("TRIAGE_TEST_INVALID").with_value("min_similarity", "1.5");
        assert!(matches!(load_with(env, None), Err(ConfigError::Validation(_))));
    }
}
