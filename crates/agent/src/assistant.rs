//! Assistant — one customer session wired end to end.
//!
//! Owns the visible conversation, the tool set offered to the primary
//! model, the session's preference store and the cost tracker. The FAQ
//! index and the therapist directory are shared and may back other
//! sessions.

use std::path::PathBuf;
use std::sync::Arc;

use blossom_config::AppConfig;
use blossom_core::message::Role;
use blossom_core::provider::Provider;
use blossom_core::{ConversationHistory, Required, Result, ToolRegistry};
use blossom_directory::{PreferenceStore, TherapistDirectory};
use blossom_providers::OpenAiCompatProvider;
use blossom_retrieval::{EmbeddingModel, ReconcileSummary, RetrievalStore, load_source};
use blossom_telemetry::{CostReport, CostTracker, ModelPricing, PricingTable};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::filtering::FilteringAgent;
use crate::orchestrator::ChatOrchestrator;
use crate::tools::{
    CONTEXT_RETRIEVER, ContextRetrieverTool, FIND_SUITABLE_THERAPISTS, PreferenceTool,
    THERAPIST_PROFILE, TherapistProfileTool,
};

pub struct Assistant {
    orchestrator: Arc<ChatOrchestrator>,
    history: ConversationHistory,
    tools: ToolRegistry,
    store: Arc<RwLock<RetrievalStore>>,
    preferences: Arc<Mutex<PreferenceStore>>,
    costs: CostTracker,
    faq_path: PathBuf,
    model: String,
}

impl Assistant {
    /// Build a session from explicit providers.
    ///
    /// `chat` serves both the primary and auxiliary models; `embeddings`
    /// backs the FAQ index, opened from `config.data_dir`.
    pub fn new(
        config: &AppConfig,
        chat: Arc<dyn Provider>,
        embeddings: Arc<dyn Provider>,
        directory: Arc<TherapistDirectory>,
    ) -> Result<Self> {
        let orchestrator = Arc::new(
            ChatOrchestrator::new(chat, config.limits.chat_context_tokens)
                .with_max_tool_steps(config.limits.max_tool_steps),
        );

        let embedder = EmbeddingModel::new(
            embeddings,
            &config.models.embedding,
            config.limits.embedding_tokens,
            config.limits.embedding_dimensions,
        );
        let store = Arc::new(RwLock::new(RetrievalStore::open(&config.data_dir, embedder)?));

        let preferences = Arc::new(Mutex::new(PreferenceStore::new(directory.clone())));
        let filtering = Arc::new(FilteringAgent::new(
            orchestrator.clone(),
            &config.models.auxiliary,
            preferences.clone(),
        ));

        let mut tools = ToolRegistry::new();
        tools.register(
            ContextRetrieverTool::new(store.clone(), config.retrieval.top_k, config.retrieval.threshold),
            CONTEXT_RETRIEVER,
            "Look up the centre's FAQ for information relevant to the customer's latest \
             message: services, fees, opening hours, location, policies.",
            &[],
            &[],
            Required::All,
        )?;
        tools.register(
            PreferenceTool::new(filtering),
            FIND_SUITABLE_THERAPISTS,
            "Record a therapist preference the customer just expressed (gender, language, \
             age group, specialisation or budget) and list the therapists who match all of \
             their preferences so far.",
            &[],
            &[],
            Required::All,
        )?;
        tools.register(
            TherapistProfileTool::new(directory),
            THERAPIST_PROFILE,
            "Show the full profile of one therapist by name.",
            &["name"],
            &["The therapist's name as the customer wrote it"],
            Required::All,
        )?;

        let mut history = ConversationHistory::new();
        history.set_max_messages(config.history.max_messages);
        history.set_system_instruction(system_prompt(config));

        let mut pricing = PricingTable::with_defaults();
        for (model, price) in &config.pricing {
            pricing.set(model, ModelPricing::new(price.input_per_m, price.output_per_m));
        }
        let costs = CostTracker::new(
            pricing,
            &config.models.primary,
            &config.models.auxiliary,
            &config.models.embedding,
        );

        info!(
            model = %config.models.primary,
            tools = tools.len(),
            "Assistant ready"
        );

        Ok(Self {
            orchestrator,
            history,
            tools,
            store,
            preferences,
            costs,
            faq_path: config.faq_path(),
            model: config.models.primary.clone(),
        })
    }

    /// Build a session against the configured OpenAI-compatible endpoint,
    /// loading the therapist directory from the data directory.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_config(config)?);
        let directory = Arc::new(TherapistDirectory::load(&config.therapists_path())?);
        Self::new(config, provider.clone(), provider, directory)
    }

    /// Answer one customer message.
    ///
    /// On error the customer message stays in the history, so the next
    /// turn sees it.
    pub async fn chat(&mut self, text: &str) -> Result<String> {
        self.history.append(Role::User, text)?;
        let answer = self
            .orchestrator
            .get_response(&mut self.history, Some(&self.tools), &self.model, true)
            .await?;
        debug!(history = self.history.len(), tokens = self.history.total_token_count(), "Turn complete");
        Ok(answer)
    }

    /// Price everything used so far and the change since the last call.
    pub async fn costs(&mut self) -> CostReport {
        let embed_tokens = self.store.read().await.embedder().total_tokens();
        self.costs.update(&self.orchestrator.usage(), embed_tokens)
    }

    /// Reconcile the FAQ index against `faq.json`.
    pub async fn sync_index(&self) -> Result<ReconcileSummary> {
        let source = load_source(&self.faq_path)?;
        self.store.write().await.reconcile(&source).await
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn preferences(&self) -> &Arc<Mutex<PreferenceStore>> {
        &self.preferences
    }

    pub fn orchestrator(&self) -> &ChatOrchestrator {
        &self.orchestrator
    }
}

/// The persona instruction for the customer-facing model.
pub fn system_prompt(config: &AppConfig) -> String {
    if let Some(custom) = &config.assistant.system_prompt_override {
        return custom.clone();
    }

    let name = &config.assistant.name;
    let centre = &config.assistant.centre;
    format!(
        "You are {name}, a friendly assistant from {centre}, a psychotherapy and counselling \
centre. Answer customers warmly and briefly.\n\
- For questions about the centre (services, fees, hours, location, policies), call \
{CONTEXT_RETRIEVER} and answer only from what it returns. If it returns nothing relevant, \
say you are not sure and suggest contacting the centre.\n\
- When the customer describes what they want in a therapist, call \
{FIND_SUITABLE_THERAPISTS}. If it returns a question or an apology, pass it on. Otherwise \
present the matching therapists by name.\n\
- When the customer asks about a specific therapist, call {THERAPIST_PROFILE}.\n\
- Never give medical advice or diagnoses. If the customer seems to be in crisis, urge \
them to contact emergency services right away."
    )
}
