//! Flat inner-product vector index.
//!
//! Exhaustive search over every stored vector. Embeddings from the
//! embedding model are unit length, so the inner product is the cosine
//! similarity.

use std::path::Path;

use blossom_core::error::StorageError;
use serde::{Deserialize, Serialize};

/// Inner product of two equal-length vectors. Mismatched or empty input
/// scores 0.0.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum();
    dot as f32
}

/// Vectors keyed by integer id, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIpIndex {
    dimensions: usize,
    ids: Vec<u64>,
    vectors: Vec<Vec<f32>>,
}

impl FlatIpIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Insert a vector under `id`, replacing any vector already stored there.
    pub fn add(&mut self, id: u64, vector: Vec<f32>) -> Result<(), StorageError> {
        if vector.len() != self.dimensions {
            return Err(StorageError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        self.remove(&[id]);
        self.ids.push(id);
        self.vectors.push(vector);
        Ok(())
    }

    /// Remove every listed id. Returns how many were present.
    pub fn remove(&mut self, ids: &[u64]) -> usize {
        let before = self.ids.len();
        let mut kept_ids = Vec::with_capacity(before);
        let mut kept_vectors = Vec::with_capacity(before);
        for (id, vector) in self.ids.drain(..).zip(self.vectors.drain(..)) {
            if !ids.contains(&id) {
                kept_ids.push(id);
                kept_vectors.push(vector);
            }
        }
        self.ids = kept_ids;
        self.vectors = kept_vectors;
        before - self.ids.len()
    }

    /// Drop every vector, keeping the dimensionality.
    pub fn reset(&mut self) {
        self.ids.clear();
        self.vectors.clear();
    }

    /// The `k` highest-scoring ids, best first. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(u64, f32)> {
        let mut scored: Vec<(u64, f32)> = self
            .ids
            .iter()
            .zip(self.vectors.iter())
            .map(|(id, v)| (*id, inner_product(v, query)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Read an index file written by [`FlatIpIndex::to_bytes`].
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let bytes = std::fs::read(path).map_err(|e| StorageError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let index: Self = serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupted {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if index.ids.len() != index.vectors.len() {
            return Err(StorageError::Corrupted {
                path: path.display().to_string(),
                reason: format!(
                    "{} ids but {} vectors",
                    index.ids.len(),
                    index.vectors.len()
                ),
            });
        }
        Ok(index)
    }

    /// Serialized form. Identical indexes produce identical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(self).map_err(|e| StorageError::Write {
            path: "vector index".into(),
            reason: e.to_string(),
        })
    }
}
