//! Shared test helpers for orchestrator, filtering and assistant tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use blossom_core::error::ProviderError;
use blossom_core::message::{Message, MessageToolCall};
use blossom_core::provider::{
    EmbeddingRequest, EmbeddingResponse, FinishReason, Provider, ProviderRequest,
    ProviderResponse, Usage,
};

/// A mock provider that returns responses in order and records every
/// request it was sent.
///
/// Embeddings are bag-of-words hashes, so identical texts score 1.0.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub const EMBED_DIMENSIONS: usize = 256;

pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBED_DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        v[(hasher.finish() % EMBED_DIMENSIONS as u64) as usize] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("SequentialMockProvider: no more responses");
        }
        Ok(responses.remove(0))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let words = request.input.split_whitespace().count() as u32;
        Ok(EmbeddingResponse {
            embeddings: vec![hash_embedding(&request.input)],
            model: request.model,
            usage: Some(Usage {
                prompt_tokens: words,
                completion_tokens: 0,
                total_tokens: words,
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

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        finish_reason: FinishReason::Stop,
        message: Message::assistant(text),
        usage: usage(),
        model: "mock".into(),
    }
}

/// A response calling `name` with `args`; the call id is `call_<name>`.
pub fn make_tool_call_response(name: &str, args: serde_json::Value) -> ProviderResponse {
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

pub fn make_finish_response(reason: FinishReason) -> ProviderResponse {
    ProviderResponse {
        finish_reason: reason,
        message: Message::assistant(""),
        usage: usage(),
        model: "mock".into(),
    }
}

/// A small directory: two English-speaking women, one Mandarin-speaking man.
pub fn sample_directory() -> blossom_directory::TherapistDirectory {
    let records = serde_json::from_value(serde_json::json!({
        "Dr. Lim": {
            "gender": "female",
            "languages": ["English", "Malay"],
            "patient_age_group": {"adults": true, "children": false},
            "specialisations": ["anxiety", "depression"],
            "rates": {"individual": {"standard": 150}, "couples": {"standard": 220}},
            "bio": "Clinical psychologist."
        },
        "Dr. Tan": {
            "gender": "female",
            "languages": ["English"],
            "patient_age_group": {"adults": true, "children": true},
            "specialisations": ["trauma"],
            "rates": {"individual": {"standard": 90}}
        },
        "Mr. Wong": {
            "gender": "male",
            "languages": ["English", "Mandarin"],
            "patient_age_group": {"adolescents": true},
            "specialisations": ["anxiety"],
            "rates": {"family": {"standard": 300}}
        }
    }))
    .unwrap();
    blossom_directory::TherapistDirectory::new(records)
}
