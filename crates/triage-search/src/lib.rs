//! Similarity search over the medical knowledge corpus

#![warn(missing_docs)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use triage_core::error::{Error, Result};
use triage_core::knowledge::KnowledgeBase;
use triage_core::models::KnowledgeMatch;
use triage_core::source::{EvidenceRequest, EvidenceSource};
use triage_llm::EmbeddingClient;

mod vector;
pub use vector::VectorIndex;

/// Number of knowledge matches handed to the engine
pub const DEFAULT_TOP_K: usize = 3;

/// Search result with score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult<T> {
    /// The matched item
    pub item: T,
    /// Relevance score (higher is better)
    pub score: f32,
}

/// Knowledge corpus embedded once at startup
pub struct KnowledgeIndex {
    base: Arc<KnowledgeBase>,
    vectors: VectorIndex,
    embedder: Arc<dyn EmbeddingClient>,
}

impl KnowledgeIndex {
    /// Embed every record of `base`
    pub async fn build(base: Arc<KnowledgeBase>, embedder: Arc<dyn EmbeddingClient>) -> Result<Self> {
        let vectors = VectorIndex::new(embedder.dimension());

        let texts: Vec<String> = base.records().iter().map(|r| r.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(Error::EmbeddingProvider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        for (record, embedding) in base.records().iter().zip(&embeddings) {
            vectors.add(record.id, embedding)?;
        }

        info!("Knowledge index built with {} records", vectors.len());
        Ok(Self {
            base,
            vectors,
            embedder,
        })
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Index holds nothing
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The `k` records nearest to `embedding`, similarity clamped to [0, 1]
    pub fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<KnowledgeMatch>> {
        let hits = self.vectors.search(embedding, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.base.get(&hit.item).map(|record| KnowledgeMatch {
                    record_id: record.id,
                    similarity: hit.score.clamp(0.0, 1.0),
                    urgency: record.urgency,
                    advice: record.advice.clone(),
                    text: record.text.clone(),
                })
            })
            .collect())
    }

    /// Embed `text` and search
    #[instrument(skip(self, text))]
    pub async fn search_text(&self, text: &str, k: usize) -> Result<Vec<KnowledgeMatch>> {
        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| Error::IndexUnavailable(format!("query embedding failed: {e}")))?;
        let matches = self.search(&embedding, k)?;
        debug!("Knowledge search returned {} matches", matches.len());
        Ok(matches)
    }
}

/// Similarity query as an evidence source
pub struct KnowledgeSearch {
    index: Arc<KnowledgeIndex>,
    top_k: usize,
    min_similarity: f32,
}

impl KnowledgeSearch {
    /// Create a source over a shared index
    pub fn new(index: Arc<KnowledgeIndex>, top_k: usize) -> Self {
        Self {
            index,
            top_k,
            min_similarity: 0.0,
        }
    }

    /// Drop matches scoring below `min_similarity`
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }
}

#[async_trait]
impl EvidenceSource for KnowledgeSearch {
    type Output = Vec<KnowledgeMatch>;

    fn name(&self) -> &'static str {
        "knowledge"
    }

    async fn is_available(&self) -> bool {
        !self.index.is_empty()
    }

    async fn query(&self, request: &EvidenceRequest<'_>) -> Result<Vec<KnowledgeMatch>> {
        let mut matches = self.index.search_text(request.raw_text, self.top_k).await?;
        matches.retain(|m| m.similarity >= self.min_similarity);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::extraction::extract;
    use triage_core::models::UrgencyLevel;
    use triage_llm::HashingEmbedder;

    async fn builtin_index() -> Arc<KnowledgeIndex> {
        let embedder = Arc::new(HashingEmbedder::new(384).unwrap());
        Arc::new(
            KnowledgeIndex::build(Arc::new(KnowledgeBase::builtin()), embedder)
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_cardiac_text_finds_cardiac_record() {
        let index = builtin_index().await;
        let matches = index
            .search_text("chest pain radiating to left arm", DEFAULT_TOP_K)
            .await
            .unwrap();

        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].urgency, UrgencyLevel::Emergency);
        assert!(matches[0].text.contains("heart attack"));
        assert!(matches.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert!(matches.iter().all(|m| (0.0..=1.0).contains(&m.similarity)));
    }

    #[tokio::test]
    async fn test_cold_text_finds_self_care_record() {
        let index = builtin_index().await;
        let matches = index
            .search_text("runny nose, sneezing and a sore throat", DEFAULT_TOP_K)
            .await
            .unwrap();
        assert_eq!(matches[0].urgency, UrgencyLevel::SelfCare);
    }

    #[tokio::test]
    async fn test_empty_index() {
        let embedder = Arc::new(HashingEmbedder::new(32).unwrap());
        let index = Arc::new(
            KnowledgeIndex::build(Arc::new(KnowledgeBase::default()), embedder)
                .await
                .unwrap(),
        );
        assert!(matches!(index.search_text("cough", 3).await, Err(Error::EmptyIndex)));

        let source = KnowledgeSearch::new(index, 3);
        assert!(!source.is_available().await);
    }

    #[tokio::test]
    async fn test_evidence_source() {
        let source = KnowledgeSearch::new(builtin_index().await, 2);
        assert_eq!(source.name(), "knowledge");
        assert!(source.is_available().await);

        let symptoms = extract("mild headache");
        let request = EvidenceRequest {
            raw_text: "mild headache",
            symptoms: &symptoms,
        };
        let matches = source.query(&request).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].text.contains("headache"));

        let strict = KnowledgeSearch::new(builtin_index().await, 3).with_min_similarity(1.0);
        let symptoms = extract("zzz qqq");
        let request = EvidenceRequest {
            raw_text: "zzz qqq",
            symptoms: &symptoms,
        };
        assert!(strict.query(&request).await.unwrap().is_empty());
    }
}
