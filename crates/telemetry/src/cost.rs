//! Cost Tracker — dollar totals and deltas over usage counters.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pricing::PricingTable;

/// Cumulative token usage of one chat model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Cumulative costs and the change since the previous report, in USD.
///
/// `model_a` is the customer-facing model, `model_b` the auxiliary one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub embed_cost: f64,
    pub embed_diff: f64,
    pub model_a_cost: f64,
    pub model_a_diff: f64,
    pub model_b_cost: f64,
    pub model_b_diff: f64,
}

impl CostReport {
    pub fn total_cost(&self) -> f64 {
        round6(self.embed_cost + self.model_a_cost + self.model_b_cost)
    }

    pub fn total_diff(&self) -> f64 {
        round6(self.embed_diff + self.model_a_diff + self.model_b_diff)
    }
}

impl fmt::Display for CostReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "embeddings ${:.6} (+{:.6}), primary ${:.6} (+{:.6}), auxiliary ${:.6} (+{:.6}), total ${:.6}",
            self.embed_cost,
            self.embed_diff,
            self.model_a_cost,
            self.model_a_diff,
            self.model_b_cost,
            self.model_b_diff,
            self.total_cost()
        )
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Remembers the last reported totals so each report can carry a delta.
#[derive(Debug, Clone)]
pub struct CostTracker {
    pricing: PricingTable,
    primary_model: String,
    auxiliary_model: String,
    embedding_model: String,
    last: CostReport,
}

impl CostTracker {
    pub fn new(
        pricing: PricingTable,
        primary_model: impl Into<String>,
        auxiliary_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            pricing,
            primary_model: primary_model.into(),
            auxiliary_model: auxiliary_model.into(),
            embedding_model: embedding_model.into(),
            last: CostReport::default(),
        }
    }

    /// Price the current counters and report the change since last call.
    ///
    /// `chat_usage` maps model name to its cumulative usage; models other
    /// than the primary and auxiliary ones are ignored.
    pub fn update(&mut self, chat_usage: &HashMap<String, ModelUsage>, embed_tokens: u64) -> CostReport {
        let chat_cost = |model: &str| {
            chat_usage
                .get(model)
                .map(|u| {
                    self.pricing
                        .compute_cost(model, u.prompt_tokens, u.completion_tokens)
                })
                .unwrap_or(0.0)
        };

        let embed_cost = round6(self.pricing.compute_cost(&self.embedding_model, embed_tokens, 0));
        let model_a_cost = round6(chat_cost(&self.primary_model));
        let model_b_cost = round6(chat_cost(&self.auxiliary_model));

        let report = CostReport {
            embed_cost,
            embed_diff: round6(embed_cost - self.last.embed_cost),
            model_a_cost,
            model_a_diff: round6(model_a_cost - self.last.model_a_cost),
            model_b_cost,
            model_b_diff: round6(model_b_cost - self.last.model_b_cost),
        };

        debug!(
            total = report.total_cost(),
            diff = report.total_diff(),
            "Cost report"
        );

        self.last = report;
        report
    }

    /// The most recent report, without recomputing.
    pub fn last(&self) -> CostReport {
        self.last
    }
}
