//! Embedding client implementations

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use triage_core::config::duration_ms;
use triage_core::error::Error;
use triage_core::error::Result;

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Provider type
    pub provider: EmbeddingProvider,
    /// Model name (Ollama only)
    pub model: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Server URL (Ollama only)
    pub base_url: String,
    /// Request timeout, in milliseconds
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
}

/// Embedding provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic feature hashing, no model required
    Hashing,
    /// Ollama embeddings API
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::Configuration(format!("unknown embedding provider: {other}"))),
        }
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: "all-minilm".to_string(),
            dimension: 384,
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Trait for embedding clients
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embeddings for a batch of texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingProvider("No embedding returned".to_string()))
    }

    /// Length of the vectors this client produces
    fn dimension(&self) -> usize;
}

/// Build the configured embedder
pub fn create_embedder(config: &EmbedderConfig) -> Result<Arc<dyn EmbeddingClient>> {
    info!("Using {:?} embeddings ({} dims)", config.provider, config.dimension);
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension)?)),
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(config.clone())?)),
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing embedder.
///
/// Words and character trigrams are hashed into a fixed number of buckets
/// and the vector is L2-normalized. Stable across runs and platforms.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimension`-long vectors
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Configuration(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    /// Embed one text synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.add_feature(&mut vector, word.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> = format!(" {word} ").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, gram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], bytes: &[u8], weight: f32) {
        let hash = fnv1a(bytes);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl EmbeddingClient for HashingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Ollama embeddings client
pub struct OllamaEmbedder {
    config: EmbedderConfig,
    client: Client,
    cache: Cache<String, Vec<f32>>,
}

impl OllamaEmbedder {
    /// Create a new embedder client
    pub fn new(config: EmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        // 4 hour TTL, 10000 entries
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(14400))
            .max_capacity(10000)
            .build();

        Ok(Self {
            config,
            client,
            cache,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Deserialize)]
        struct EmbeddingResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.config.base_url);
        let request = serde_json::json!({
            "model": self.config.model,
            "prompt": text
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Error::EmbeddingProvider(format!(
                    "Ollama embedding request failed: {}. Make sure Ollama is running on {}",
                    e, self.config.base_url
                ))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingProvider(format!(
                "Ollama embedding error: {}. Check that the model '{}' supports embeddings.",
                error_text, self.config.model
            )));
        }

        let data: EmbeddingResponse = response.json().await.map_err(|e| {
            Error::EmbeddingProvider(format!("Failed to parse Ollama embedding response: {}", e))
        })?;

        if data.embedding.len() != self.config.dimension {
            return Err(Error::EmbeddingProvider(format!(
                "Model '{}' returned {} dimensions, expected {}",
                self.config.model,
                data.embedding.len(),
                self.config.dimension
            )));
        }
        Ok(data.embedding)
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        // Ollama embeds one prompt per request
        for text in texts {
            if let Some(embedding) = self.cache.get(text).await {
                debug!("Cache hit for embedding");
                results.push(embedding);
                continue;
            }
            let embedding = self.embed_one(text).await?;
            self.cache.insert(text.clone(), embedding.clone()).await;
            results.push(embedding);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_embedder_config_default() {
        let config = EmbedderConfig::default();
        assert_eq!(config.provider, EmbeddingProvider::Hashing);
        assert_eq!(config.dimension, 384);
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Ollama".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::Ollama);
        assert!("openai".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let a = embedder.embed_text("Chest pain radiating to left arm");
        let b = embedder.embed_text("chest pain, radiating to LEFT arm");
        assert_eq!(a, b);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_similarity_tracks_overlap() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let query = embedder.embed_text("runny nose and sore throat");
        let cold = embedder.embed_text("Common cold symptoms: runny nose, sore throat, sneezing");
        let cardiac = embedder.embed_text("Chest pain radiating to arm or jaw");
        assert!(cosine(&query, &cold) > cosine(&query, &cardiac));
    }

    #[test]
    fn test_empty_text_embeds_to_zero() {
        let embedder = HashingEmbedder::new(16).unwrap();
        assert!(embedder.embed_text("  ...  ").iter().all(|v| *v == 0.0));
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[tokio::test]
    async fn test_create_embedder() {
        let embedder = create_embedder(&EmbedderConfig::default()).unwrap();
        assert_eq!(embedder.dimension(), 384);
        let vector = embedder.embed("fever").await.unwrap();
        assert_eq!(vector.len(), 384);
    }

    #[tokio::test]
    async fn test_unreachable_ollama_embedder_fails() {
        let config = EmbedderConfig {
            provider: EmbeddingProvider::Ollama,
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert!(matches!(
            embedder.embed("fever").await,
            Err(Error::EmbeddingProvider(_))
        ));
    }
}
