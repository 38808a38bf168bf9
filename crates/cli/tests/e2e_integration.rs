//! End-to-end integration tests for the Blossom assistant.
//!
//! These tests exercise the full pipeline from customer text to answer:
//! history update, tool dispatch, FAQ retrieval, and the preference
//! filtering sub-dialogue, against a directory and FAQ on disk.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use blossom_agent::Assistant;
use blossom_config::AppConfig;
use blossom_core::error::ProviderError;
use blossom_core::message::{Message, MessageToolCall, Role};
use blossom_core::provider::{
    EmbeddingRequest, EmbeddingResponse, FinishReason, Provider, ProviderRequest,
    ProviderResponse, Usage,
};
use blossom_directory::{Attribute, TherapistDirectory};
use serde_json::json;

const DIMENSIONS: usize = 128;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence and
/// embeds text as a hashed bag of words.
struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<ProviderResponse>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
    embed_calls: std::sync::Mutex<usize>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            requests: std::sync::Mutex::new(Vec::new()),
            embed_calls: std::sync::Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn embed_calls(&self) -> usize {
        *self.embed_calls.lock().unwrap()
    }

    fn request(&self, n: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        if requests.len() >= responses.len() {
            panic!(
                "ScriptedProvider exhausted: call #{}, have {}",
                requests.len(),
                responses.len()
            );
        }
        let resp = responses[requests.len()].clone();
        requests.push(request);
        Ok(resp)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        *self.embed_calls.lock().unwrap() += 1;

        let mut v = vec![0.0f32; DIMENSIONS];
        for word in request
            .input
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % DIMENSIONS as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter_mut().for_each(|x| *x /= norm.max(f32::EPSILON));

        let tokens = request.input.split_whitespace().count() as u32;
        Ok(EmbeddingResponse {
            embeddings: vec![v],
            model: request.model,
            usage: Some(Usage {
                prompt_tokens: tokens,
                completion_tokens: 0,
                total_tokens: tokens,
            }),
        })
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        finish_reason: FinishReason::Stop,
        message: Message::assistant(text),
        usage: usage(),
        model: "mock".into(),
    }
}

fn tool_response(name: &str, args: serde_json::Value) -> ProviderResponse {
    ProviderResponse {
        finish_reason: FinishReason::ToolCalls,
        message: Message::tool_call(MessageToolCall {
            id: format!("call_{name}"),
            name: name.into(),
            arguments: args.to_string(),
        }),
        usage: usage(),
        model: "mock".into(),
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn write_fixtures(dir: &Path) {
    std::fs::write(
        dir.join("therapists.json"),
        json!({
            "Dr. Aisha Rahman": {
                "gender": "female",
                "languages": ["English", "Malay"],
                "patient_age_group": {"adults": true, "children": false},
                "specialisations": ["anxiety", "grief"],
                "availability": {"monday": ["09:00", "17:00"], "sunday": null},
                "rates": {"individual": {"standard": 160, "concession": 110}},
                "qualifications": "MPsych (Clinical)"
            },
            "Dr. Chen Wei": {
                "gender": "male",
                "languages": ["English", "Mandarin"],
                "patient_age_group": {"adults": true, "adolescents": true},
                "specialisations": ["anxiety", "addiction"],
                "rates": {"individual": {"standard": 180}, "couples": {"standard": 240}}
            },
            "Ms. Priya Nair": {
                "gender": "female",
                "languages": ["English", "Tamil"],
                "target_age_group": {"children": true, "adolescents": true},
                "specialisations": ["ADHD"],
                "rates": {"family": {"standard": 280}, "individual": {"standard": null}}
            }
        })
        .to_string(),
    )
    .unwrap();

    std::fs::write(
        dir.join("faq.json"),
        json!({
            "What are your opening hours?": "We are open 9am to 6pm, Monday to Saturday.",
            "Do you offer online sessions?": "Yes, all our therapists offer video sessions.",
            "How much does a first session cost?": "First sessions start from $110."
        })
        .to_string(),
    )
    .unwrap();
}

fn config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.data_dir = dir.to_path_buf();
    config.limits.embedding_dimensions = DIMENSIONS;
    config
}

fn assistant(dir: &Path, provider: Arc<ScriptedProvider>) -> Assistant {
    let config = config(dir);
    let directory = TherapistDirectory::load(&config.therapists_path()).unwrap();
    Assistant::new(&config, provider.clone(), provider, Arc::new(directory)).unwrap()
}

fn tool_results(assistant: &Assistant) -> Vec<String> {
    assistant
        .history()
        .messages()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.clone())
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_preference_turns_narrow_the_shortlist() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path());

    let provider = Arc::new(ScriptedProvider::new(vec![
        // Turn 1
        tool_response("find_suitable_therapists", json!({})),
        text_response("I would like a female therapist."),
        text_response("gender"),
        tool_response("update_gender", json!({"value": "Female"})),
        text_response("Done"),
        text_response("Dr. Aisha Rahman and Ms. Priya Nair are both available."),
        // Turn 2
        tool_response("find_suitable_therapists", json!({})),
        text_response("I would like a female therapist who speaks Malay."),
        text_response("languages"),
        tool_response("update_languages", json!({"value": "Malay"})),
        text_response("Done"),
        text_response("Dr. Aisha Rahman speaks Malay."),
    ]));
    let mut assistant = assistant(tmp.path(), provider.clone());

    let first = assistant.chat("Can I see a woman?").await.unwrap();
    assert_eq!(first, "Dr. Aisha Rahman and Ms. Priya Nair are both available.");

    let second = assistant.chat("And she should speak Malay").await.unwrap();
    assert_eq!(second, "Dr. Aisha Rahman speaks Malay.");
    assert_eq!(provider.calls(), 12);

    let results = tool_results(&assistant);
    let shortlist: serde_json::Value = serde_json::from_str(&results[0]).unwrap();
    assert_eq!(
        shortlist["suitable_therapists"],
        json!(["Dr. Aisha Rahman", "Ms. Priya Nair"])
    );
    let shortlist: serde_json::Value = serde_json::from_str(&results[1]).unwrap();
    assert_eq!(shortlist["suitable_therapists"], json!(["Dr. Aisha Rahman"]));
    assert_eq!(shortlist["preferences"]["languages"], "Malay");

    // Only the customer-facing exchange reached the visible history.
    let roles: Vec<Role> = assistant.history().messages().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
        ]
    );

    // The rephrase step saw the whole conversation so far.
    let rephrase = provider.request(7);
    assert_eq!(rephrase.model, "gpt-4o-mini");
    assert!(rephrase.messages.iter().any(|m| m.content == "Can I see a woman?"));
    assert_eq!(rephrase.messages.last().unwrap().content, "And she should speak Malay");
}

#[tokio::test]
async fn e2e_invalid_option_becomes_an_apology_not_a_failure() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path());

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response("find_suitable_therapists", json!({})),
        text_response("I would like a therapist who speaks Frnch."),
        text_response("languages"),
        tool_response("update_languages", json!({"value": "Frnch"})),
        text_response("Error"),
        text_response("Sorry, none of our therapists speak French."),
    ]));
    let mut assistant = assistant(tmp.path(), provider.clone());

    let answer = assistant.chat("Frnch speaker please").await.unwrap();
    assert_eq!(answer, "Sorry, none of our therapists speak French.");

    // The handler saw every language, closest first.
    let handler_retry = provider.request(4);
    let fed_back: serde_json::Value =
        serde_json::from_str(&handler_retry.messages.last().unwrap().content).unwrap();
    assert_eq!(fed_back["invalid_value"], "Frnch");
    assert_eq!(fed_back["valid_options"].as_array().unwrap().len(), 4);

    // The main model got the canned apology with the option list.
    let apology = &tool_results(&assistant)[0];
    assert!(apology.contains("English, Malay, Mandarin, Tamil"));

    let preferences = assistant.preferences().lock().await;
    assert!(preferences.selected(Attribute::Languages).is_none());
    assert_eq!(preferences.candidate_providers().len(), 3);
}

#[tokio::test]
async fn e2e_faq_question_is_answered_from_retrieved_context() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path());

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response("context_retriever", json!({})),
        text_response("We're open 9am to 6pm, Monday to Saturday."),
    ]));
    let mut assistant = assistant(tmp.path(), provider.clone());

    let summary = assistant.sync_index().await.unwrap();
    assert_eq!(summary.added, 3);
    assert_eq!(provider.embed_calls(), 3);

    let answer = assistant.chat("What are your opening hours?").await.unwrap();
    assert_eq!(answer, "We're open 9am to 6pm, Monday to Saturday.");

    let context: serde_json::Value = serde_json::from_str(&tool_results(&assistant)[0]).unwrap();
    assert_eq!(context[0]["question"], "What are your opening hours?");
    assert_eq!(
        context[0]["answer"],
        "We are open 9am to 6pm, Monday to Saturday."
    );

    let report = assistant.costs().await;
    assert!(report.model_a_cost > 0.0);
    assert_eq!(report.model_b_cost, 0.0);
}

#[tokio::test]
async fn e2e_index_survives_restart_without_reembedding() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path());

    let first = Arc::new(ScriptedProvider::new(vec![]));
    assistant(tmp.path(), first.clone()).sync_index().await.unwrap();
    assert_eq!(first.embed_calls(), 3);

    // Edit one answer and add one question.
    std::fs::write(
        tmp.path().join("faq.json"),
        json!({
            "What are your opening hours?": "We are open 9am to 8pm every day.",
            "Do you offer online sessions?": "Yes, all our therapists offer video sessions.",
            "How much does a first session cost?": "First sessions start from $110.",
            "Where are you located?": "Level 3, 12 Orchard Road."
        })
        .to_string(),
    )
    .unwrap();

    let second = Arc::new(ScriptedProvider::new(vec![]));
    let restarted = assistant(tmp.path(), second.clone());
    let summary = restarted.sync_index().await.unwrap();
    assert_eq!(summary.added, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.removed, 0);
    assert_eq!(second.embed_calls(), 1);
}

#[tokio::test]
async fn e2e_profile_lookup_resolves_misspelt_name() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path());

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response("therapist_profile", json!({"name": "Dr Chen Wai"})),
        text_response("Dr. Chen Wei works with adults and adolescents."),
    ]));
    let mut assistant = assistant(tmp.path(), provider);

    assistant.chat("Tell me about Dr Chen Wai").await.unwrap();

    let profile: serde_json::Value = serde_json::from_str(&tool_results(&assistant)[0]).unwrap();
    assert_eq!(profile["name"], "Dr. Chen Wei");
    assert_eq!(profile["profile"]["rates"]["couples"]["standard"], 240.0);
}

#[tokio::test]
async fn e2e_direct_answer_no_tools() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path());

    let provider = Arc::new(ScriptedProvider::new(vec![text_response(
        "Hi! I'm Tan from Psychology Blossom. How can I help?",
    )]));
    let mut assistant = assistant(tmp.path(), provider.clone());

    let answer = assistant.chat("hello").await.unwrap();
    assert!(answer.starts_with("Hi! I'm Tan"));
    assert_eq!(provider.calls(), 1);

    let sent = provider.request(0);
    assert_eq!(sent.messages[0].role, Role::System);
    assert!(sent.messages[0].content.contains("Psychology Blossom"));
    assert_eq!(sent.tools.len(), 3);
}
