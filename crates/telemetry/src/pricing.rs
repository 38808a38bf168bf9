//! Built-in pricing table for the models Blossom talks to.
//!
//! Prices are in USD per 1 million tokens. Each model has an input and
//! output price; embedding models only have an input price. Custom pricing
//! can be added at startup from the TOML config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Pricing table with built-in defaults and custom overrides.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        // ── Chat ───────────────────────────────────────────────────
        prices.insert("gpt-4o".into(), ModelPricing::new(2.5, 10.0));
        prices.insert("gpt-4o-mini".into(), ModelPricing::new(0.15, 0.6));
        prices.insert("gpt-4-turbo".into(), ModelPricing::new(10.0, 30.0));

        // ── Embeddings ─────────────────────────────────────────────
        prices.insert("text-embedding-3-small".into(), ModelPricing::new(0.02, 0.0));
        prices.insert("text-embedding-3-large".into(), ModelPricing::new(0.13, 0.0));
        prices.insert("text-embedding-ada-002".into(), ModelPricing::new(0.1, 0.0));

        Self { prices }
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Look up pricing for a model. Returns None if not found.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        self.prices.get(model).copied()
    }

    /// Add or update pricing for a model.
    pub fn set(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices.insert(model.into(), pricing);
    }

    /// Resolve a model name to its pricing.
    ///
    /// Tries an exact match first, then the longest known name that
    /// prefixes the model (`gpt-4o-mini-2024-07-18` → `gpt-4o-mini`).
    pub fn resolve(&self, model: &str) -> Option<ModelPricing> {
        if let Some(p) = self.prices.get(model) {
            return Some(*p);
        }

        let model_lower = model.to_lowercase();
        self.prices
            .iter()
            .filter(|(key, _)| model_lower.starts_with(&key.to_lowercase()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, p)| *p)
    }

    /// Compute cost for a model call, returning 0.0 if model is unknown.
    pub fn compute_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.resolve(model)
            .map(|p| p.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }

    /// List all known model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prices.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_cost() {
        let table = PricingTable::with_defaults();

        // gpt-4o: $2.50/M input, $10/M output
        let cost = table.compute_cost("gpt-4o", 1000, 500);
        // (1000 * 2.5 + 500 * 10) / 1M = 0.0075
        assert!((cost - 0.0075).abs() < 1e-10);
    }

    #[test]
    fn embedding_model_has_no_output_price() {
        let table = PricingTable::with_defaults();
        let cost = table.compute_cost("text-embedding-3-small", 1_000_000, 0);
        assert!((cost - 0.02).abs() < 1e-10);
    }

    #[test]
    fn versioned_name_matches_longest_prefix() {
        let table = PricingTable::with_defaults();
        let mini = table.resolve("gpt-4o-mini-2024-07-18").unwrap();
        assert_eq!(mini, ModelPricing::new(0.15, 0.6));
        let full = table.resolve("gpt-4o-2024-08-06").unwrap();
        assert_eq!(full, ModelPricing::new(2.5, 10.0));
    }

    #[test]
    fn unknown_model_returns_zero() {
        let table = PricingTable::with_defaults();
        assert_eq!(table.compute_cost("unknown-model-xyz", 1000, 500), 0.0);
    }

    #[test]
    fn custom_pricing_overrides_default() {
        let mut table = PricingTable::with_defaults();
        table.set("gpt-4o", ModelPricing::new(5.0, 20.0));
        let cost = table.compute_cost("gpt-4o", 1_000_000, 0);
        assert!((cost - 5.0).abs() < 1e-10);

        let mut empty = PricingTable::empty();
        assert!(empty.is_empty());
        empty.set("local-model", ModelPricing::new(1.0, 2.0));
        assert_eq!(empty.models(), vec!["local-model"]);
    }
}
