//! Embedding model wrapper.
//!
//! Enforces the embedding model's input limit before any network call and
//! keeps a running total of embedding tokens for cost reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use blossom_core::provider::{EmbeddingRequest, Provider};
use blossom_core::token::embed_token_count;
use blossom_core::{Error, Result};
use tracing::debug;

pub struct EmbeddingModel {
    provider: Arc<dyn Provider>,
    model: String,
    token_limit: usize,
    dimensions: usize,
    total_tokens: AtomicU64,
}

impl EmbeddingModel {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        token_limit: usize,
        dimensions: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            token_limit,
            dimensions,
            total_tokens: AtomicU64::new(0),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embedding tokens consumed so far. Never decreases.
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(Ordering::Relaxed)
    }

    /// Embed one piece of text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = embed_token_count(text);
        if tokens > self.token_limit {
            return Err(Error::TokenLimit(format!(
                "embedding input is {tokens} tokens, limit is {}",
                self.token_limit
            )));
        }

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                input: text.to_string(),
            })
            .await?;

        let used = response
            .usage
            .map(|u| u.total_tokens as u64)
            .unwrap_or(tokens as u64);
        self.total_tokens.fetch_add(used, Ordering::Relaxed);

        debug!(model = %self.model, tokens = used, "Embedded text");

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Unexpected("embedding response carried no vectors".into()))
    }
}
