//! Chat Orchestrator — drives model calls and tool dispatch for one turn.
//!
//! Each step checks the token budget, sends the serialized history and the
//! tool schema to the model, and reads the finish reason:
//!
//! 1. **Stop**: return the text, recording it when asked to
//! 2. **Tool call**: dispatch the first call, append call and result,
//!    take another step
//! 3. **Anything else**: fail the turn
//!
//! The loop is bounded by `max_tool_steps`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use blossom_core::message::Role;
use blossom_core::provider::{FinishReason, Provider, ProviderRequest, Usage};
use blossom_core::{ConversationHistory, Error, Result, ToolRegistry};
use blossom_telemetry::ModelUsage;
use tracing::{debug, warn};

pub struct ChatOrchestrator {
    provider: Arc<dyn Provider>,

    /// Context window of the chat models, in tokens
    context_limit: usize,

    /// Model calls allowed in one `get_response`
    max_tool_steps: u32,

    /// Cumulative usage per requested model name
    usage: Mutex<HashMap<String, ModelUsage>>,
}

impl ChatOrchestrator {
    pub fn new(provider: Arc<dyn Provider>, context_limit: usize) -> Self {
        Self {
            provider,
            context_limit,
            max_tool_steps: 16,
            usage: Mutex::new(HashMap::new()),
        }
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_tool_steps(mut self, max: u32) -> Self {
        self.max_tool_steps = max.max(1);
        self
    }

    /// Run the model against `history` until it produces text.
    ///
    /// With `record_response` the final text is appended to `history` as an
    /// assistant message; sub-calls that only need an answer pass `false`.
    /// Tool calls and their results are always appended.
    pub async fn get_response(
        &self,
        history: &mut ConversationHistory,
        tools: Option<&ToolRegistry>,
        model: &str,
        record_response: bool,
    ) -> Result<String> {
        let definitions = tools.map(ToolRegistry::definitions).unwrap_or_default();

        if let Some(latest) = history.latest_content() {
            debug!(model, latest, "Latest message");
        }

        for step in 1..=self.max_tool_steps {
            let tokens = history.total_token_count();
            if tokens > self.context_limit {
                return Err(Error::TokenLimit(format!(
                    "conversation is {tokens} tokens, limit is {}",
                    self.context_limit
                )));
            }

            debug!(model, step, tokens, "Model call");

            let request = ProviderRequest {
                model: model.to_string(),
                messages: history.serialize(),
                tools: definitions.clone(),
            };
            let response = self.provider.complete(request).await?;

            debug!(model, step, finish_reason = ?response.finish_reason, "Model responded");

            match response.finish_reason {
                FinishReason::Stop => {
                    self.record_usage(model, response.usage);
                    let text = response.message.content;
                    if record_response {
                        history.append(Role::Assistant, text.clone())?;
                    }
                    debug!(model, response = %text, "Final response");
                    return Ok(text);
                }
                FinishReason::ToolCalls => {
                    self.record_usage(model, response.usage);
                    let call = response.message.tool_calls.into_iter().next().ok_or_else(|| {
                        Error::Unexpected("finish reason was tool_calls but no call was sent".into())
                    })?;
                    let registry = tools.ok_or_else(|| {
                        Error::Unexpected(format!(
                            "model requested tool '{}' but no tools were offered",
                            call.name
                        ))
                    })?;

                    debug!(tool = %call.name, args = %call.arguments, "Dispatching tool call");

                    let result = match registry.invoke(&call.name, &call.arguments, history).await {
                        Ok(result) => result,
                        Err(e) if e.is_recoverable() => {
                            warn!(tool = %call.name, error = %e, "Tool rejected its input");
                            recoverable_result(&e)
                        }
                        Err(e) => return Err(e),
                    };

                    history.append_tool_call(call.id.clone(), call.arguments, call.name);
                    history.append_tool_result(call.id, result);
                }
                FinishReason::Length => {
                    return Err(Error::TokenLimit(
                        "response was cut off by the output length limit".into(),
                    ));
                }
                FinishReason::ContentFilter => {
                    return Err(Error::PolicyViolation(
                        "response was blocked by the provider's content filter".into(),
                    ));
                }
                FinishReason::Other(reason) => {
                    return Err(Error::Unexpected(format!("unknown finish reason '{reason}'")));
                }
            }
        }

        Err(Error::Unexpected(format!(
            "no final response after {} model calls",
            self.max_tool_steps
        )))
    }

    fn record_usage(&self, model: &str, usage: Option<Usage>) {
        let Some(usage) = usage else {
            return;
        };
        let mut totals = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = totals.entry(model.to_string()).or_default();
        entry.prompt_tokens += u64::from(usage.prompt_tokens);
        entry.completion_tokens += u64::from(usage.completion_tokens);
    }

    /// Cumulative usage per model. Counters only ever grow.
    pub fn usage(&self) -> HashMap<String, ModelUsage> {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn usage_for(&self, model: &str) -> ModelUsage {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
            .copied()
            .unwrap_or_default()
    }
}

/// Tool result handed back to the model when a tool rejects its input.
fn recoverable_result(error: &Error) -> String {
    match error {
        Error::InvalidOption { input, suggestions } => serde_json::json!({
            "status": "error",
            "invalid_value": input,
            "valid_options": suggestions,
        })
        .to_string(),
        other => serde_json::json!({"status": "error", "message": other.to_string()}).to_string(),
    }
}
