//! Tools offered to the customer-facing model.

use std::sync::Arc;

use async_trait::async_trait;
use blossom_core::{ConversationHistory, Result, ToolArgs, ToolHandler};
use blossom_directory::{Attribute, TherapistDirectory};
use blossom_retrieval::RetrievalStore;
use tokio::sync::RwLock;
use tracing::debug;

use crate::filtering::{FilterOutcome, FilteringAgent};

pub const CONTEXT_RETRIEVER: &str = "context_retriever";
pub const FIND_SUITABLE_THERAPISTS: &str = "find_suitable_therapists";
pub const THERAPIST_PROFILE: &str = "therapist_profile";

/// Looks the latest customer message up in the FAQ index.
pub struct ContextRetrieverTool {
    store: Arc<RwLock<RetrievalStore>>,
    top_k: usize,
    threshold: f32,
}

impl ContextRetrieverTool {
    pub fn new(store: Arc<RwLock<RetrievalStore>>, top_k: usize, threshold: f32) -> Self {
        Self {
            store,
            top_k,
            threshold,
        }
    }
}

#[async_trait]
impl ToolHandler for ContextRetrieverTool {
    async fn invoke(&self, _args: ToolArgs, history: &mut ConversationHistory) -> Result<String> {
        let Some(query) = history.latest_user_message() else {
            return Ok("[]".to_string());
        };

        let answers = self
            .store
            .read()
            .await
            .query(query, self.top_k, self.threshold)
            .await?;
        debug!(matches = answers.len(), "FAQ context retrieved");

        let pairs: Vec<serde_json::Value> = answers
            .into_iter()
            .map(|a| serde_json::json!({"question": a.question, "answer": a.answer}))
            .collect();
        Ok(serde_json::Value::Array(pairs).to_string())
    }
}

/// Runs the filtering agent and reports the resulting shortlist.
pub struct PreferenceTool {
    agent: Arc<FilteringAgent>,
}

impl PreferenceTool {
    pub fn new(agent: Arc<FilteringAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl ToolHandler for PreferenceTool {
    async fn invoke(&self, _args: ToolArgs, history: &mut ConversationHistory) -> Result<String> {
        if let FilterOutcome::NeedsClarification(text) = self.agent.run(history).await? {
            return Ok(text);
        }

        let store = self.agent.preferences().lock().await;
        let preferences: serde_json::Map<String, serde_json::Value> = Attribute::ALL
            .iter()
            .filter_map(|a| store.selected(*a).map(|v| (a.key().to_string(), v.into())))
            .collect();

        Ok(serde_json::json!({
            "suitable_therapists": store.candidate_providers(),
            "preferences": preferences,
            "price": store.price(),
        })
        .to_string())
    }
}

/// Shows one therapist's profile, resolving near-miss names.
pub struct TherapistProfileTool {
    directory: Arc<TherapistDirectory>,
}

impl TherapistProfileTool {
    pub fn new(directory: Arc<TherapistDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ToolHandler for TherapistProfileTool {
    async fn invoke(&self, args: ToolArgs, _history: &mut ConversationHistory) -> Result<String> {
        let name = args.require_str("name")?;
        let result = match self.directory.lookup_provider(&name) {
            Some((resolved, profile)) => serde_json::json!({"name": resolved, "profile": profile}),
            None => serde_json::json!({"error": "No therapists are listed yet"}),
        };
        Ok(result.to_string())
    }
}
