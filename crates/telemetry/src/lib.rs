//! Cost tracking for Blossom.
//!
//! Token usage is counted where it happens (the orchestrator for chat
//! models, the embedding wrapper for embeddings). This crate turns those
//! monotonically increasing counters into dollar figures and reports the
//! change since the previous report.

pub mod cost;
pub mod pricing;

pub use cost::{CostReport, CostTracker, ModelUsage};
pub use pricing::{ModelPricing, PricingTable};
