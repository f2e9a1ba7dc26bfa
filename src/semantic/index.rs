//! In-memory vector index with cosine similarity search.
//!
//! Holds item embeddings keyed by item id. The store decides which ids are
//! eligible for a query (workspace, status); the index only scores them.

use std::collections::HashMap;

/// An entry in the vector index.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// Hash of the content that was embedded
    pub content_hash: u64,
    pub embedding: Vec<f32>,
}

pub struct VectorIndex {
    entries: HashMap<u64, VectorEntry>,
    /// Expected embedding dimensions, fixed by the first insert when zero
    dimensions: usize,
}

/// A scored hit from [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: u64,
    /// Cosine similarity
    pub score: f32,
}

impl VectorIndex {
    /// Create an empty index. `dimensions == 0` accepts whatever length the
    /// first inserted vector has.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: HashMap::new(),
            dimensions,
        }
    }

    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace the embedding of an item.
    pub fn insert(
        &mut self,
        id: u64,
        content_hash: u64,
        embedding: Vec<f32>,
    ) -> Result<(), IndexError> {
        if self.dimensions == 0 {
            self.dimensions = embedding.len();
        }

        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        if l2_norm(&embedding) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        self.entries.insert(
            id,
            VectorEntry {
                content_hash,
                embedding,
            },
        );

        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &VectorEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Score every eligible entry against `query`.
    ///
    /// Only entries for which `eligible(id)` holds and whose similarity is
    /// strictly above `threshold` are returned, best first (ties by id),
    /// truncated to `limit`.
    pub fn search<F>(
        &self,
        query: &[f32],
        eligible: F,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<Neighbor>, IndexError>
    where
        F: Fn(u64) -> bool,
    {
        if self.is_empty() {
            return Ok(vec![]);
        }

        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let mut results: Vec<Neighbor> = self
            .entries
            .iter()
            .filter(|(id, _)| eligible(**id))
            .filter_map(|(id, entry)| {
                let score = cosine_similarity(query, &entry.embedding, query_norm);
                (score > threshold).then_some(Neighbor { id: *id, score })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);

        Ok(results)
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot_product / (query_norm * target_norm)
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,
}
