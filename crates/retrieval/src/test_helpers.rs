//! Deterministic embedding provider for tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use blossom_core::error::ProviderError;
use blossom_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};

/// Bag-of-words embedder: each lowercase word is hashed into a bucket and
/// the counts are normalized to unit length. Identical texts score 1.0,
/// texts with no words in common score 0.0.
pub struct HashEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % self.dimensions as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait::async_trait]
impl Provider for HashEmbedder {
    fn name(&self) -> &str {
        "hash_embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("embedding only".into()))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let words = request.input.split_whitespace().count() as u32;
        Ok(EmbeddingResponse {
            embeddings: vec![self.vector(&request.input)],
            model: request.model,
            usage: Some(Usage {
                prompt_tokens: words,
                completion_tokens: 0,
                total_tokens: words.max(1),
            }),
        })
    }
}
