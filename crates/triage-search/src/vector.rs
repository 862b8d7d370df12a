//! In-memory vector index

use dashmap::DashMap;
use tracing::debug;
use triage_core::error::{Error, Result};
use uuid::Uuid;

use crate::SearchResult;

/// Flat brute-force cosine index, fine for a corpus of a few thousand records
pub struct VectorIndex {
    vectors: DashMap<Uuid, Vec<f32>>,
    dimension: usize,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension`
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: DashMap::new(),
            dimension,
        }
    }

    /// Add a vector to the index
    pub fn add(&self, id: Uuid, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::Validation(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }

        self.vectors.insert(id, vector.to_vec());
        debug!("Added vector for ID: {}", id);
        Ok(())
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Index holds nothing
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Top `limit` vectors by similarity; ties are broken by id so results are stable
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult<Uuid>>> {
        if query.len() != self.dimension {
            return Err(Error::Validation(format!(
                "Query vector dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }
        if self.vectors.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let mut results: Vec<SearchResult<Uuid>> = self
            .vectors
            .iter()
            .map(|entry| SearchResult {
                item: *entry.key(),
                score: cosine_similarity(query, entry.value()),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item.cmp(&b.item))
        });
        results.truncate(limit);

        Ok(results)
    }
}

/// Compute cosine similarity between two vectors
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_index_ranking() {
        let index = VectorIndex::new(3);
        let near = Uuid::new_v4();
        let far = Uuid::new_v4();
        index.add(near, &[1.0, 0.1, 0.0]).unwrap();
        index.add(far, &[0.0, 1.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].item, near);
        assert!(results[0].score > results[1].score);

        assert_eq!(index.search(&[1.0, 0.0, 0.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let index = VectorIndex::new(2);
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        index.add(b, &[1.0, 0.0]).unwrap();
        index.add(a, &[1.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].item, a);
        assert_eq!(results[1].item, b);
    }

    #[test]
    fn test_dimension_mismatch_and_empty() {
        let index = VectorIndex::new(3);
        assert!(matches!(index.search(&[1.0, 0.0, 0.0], 3), Err(Error::EmptyIndex)));
        assert!(index.add(Uuid::new_v4(), &[1.0]).is_err());
        assert!(index.search(&[1.0], 3).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[-1.0, 0.0, 0.0]), -1.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

}
