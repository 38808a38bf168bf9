//! Conversation History — a bounded message log plus a system instruction.
//!
//! The system instruction lives in its own slot and is never evicted; the
//! user/assistant/tool entries are capped by an optional `max_messages`
//! bound with FIFO eviction. Every entry caches its chat-encoding token
//! count at insertion time.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use crate::error::{Error, Result};
use crate::message::{Message, MessageToolCall, Role};
use crate::token::chat_token_count;

#[derive(Debug, Clone)]
struct HistoryEntry {
    message: Message,
    tokens: usize,
}

/// An ordered, optionally bounded conversation log.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    system_instruction: String,
    system_tokens: usize,
    entries: VecDeque<HistoryEntry>,
    max_messages: Option<usize>,
}

impl ConversationHistory {
    /// Create an unbounded, empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history that keeps at most `max_messages` entries
    /// (the system instruction does not count). A bound of zero is
    /// treated as one.
    pub fn bounded(max_messages: usize) -> Self {
        Self {
            max_messages: Some(max_messages.max(1)),
            ..Self::default()
        }
    }

    pub fn max_messages(&self) -> Option<usize> {
        self.max_messages
    }

    /// Change the bound. Shrinking evicts the oldest entries until the
    /// history fits.
    pub fn set_max_messages(&mut self, max_messages: Option<usize>) {
        self.max_messages = max_messages.map(|m| m.max(1));
        if let Some(max) = self.max_messages {
            while self.entries.len() > max {
                self.entries.pop_front();
            }
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn set_system_instruction(&mut self, text: impl Into<String>) {
        self.system_instruction = text.into();
        self.system_tokens = chat_token_count(&self.system_instruction);
    }

    /// Swap in a temporary system instruction.
    ///
    /// The previous instruction is restored when the returned guard drops,
    /// on every exit path including `?` returns and panics.
    pub fn scoped_instruction(&mut self, text: impl Into<String>) -> ScopedInstruction<'_> {
        let saved = std::mem::take(&mut self.system_instruction);
        self.set_system_instruction(text);
        ScopedInstruction {
            history: self,
            saved: Some(saved),
        }
    }

    /// Append a user or assistant message.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Result<()> {
        let message = match role {
            Role::User => Message::user(content),
            Role::Assistant => Message::assistant(content),
            other => return Err(Error::InvalidRole(other)),
        };
        let tokens = chat_token_count(&message.content);
        self.push(message, tokens);
        Ok(())
    }

    /// Append the assistant's request to call a tool.
    pub fn append_tool_call(
        &mut self,
        call_id: impl Into<String>,
        args_json: impl Into<String>,
        tool_name: impl Into<String>,
    ) {
        let message = Message::tool_call(MessageToolCall {
            id: call_id.into(),
            name: tool_name.into(),
            arguments: args_json.into(),
        });
        self.push_structured(message);
    }

    /// Append the result of a tool call.
    pub fn append_tool_result(&mut self, call_id: impl Into<String>, result_json: impl Into<String>) {
        self.push_structured(Message::tool_result(call_id, result_json));
    }

    fn push_structured(&mut self, message: Message) {
        let tokens = chat_token_count(&message.wire_value().to_string());
        self.push(message, tokens);
    }

    fn push(&mut self, message: Message, tokens: usize) {
        if let Some(max) = self.max_messages {
            while self.entries.len() >= max {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(HistoryEntry { message, tokens });
    }

    /// Tokens of the system instruction plus every retained entry.
    pub fn total_token_count(&self) -> usize {
        self.system_tokens + self.entries.iter().map(|e| e.tokens).sum::<usize>()
    }

    /// The history as sent to a model: system instruction first, then the
    /// retained entries in insertion order.
    pub fn serialize(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.entries.len() + 1);
        messages.push(Message::system(&self.system_instruction));
        messages.extend(self.entries.iter().map(|e| e.message.clone()));
        messages
    }

    /// Retained entries, oldest first (system instruction excluded).
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content of the most recent entry.
    pub fn latest_content(&self) -> Option<&str> {
        self.entries.back().map(|e| e.message.content.as_str())
    }

    /// Content of the most recent user message.
    pub fn latest_user_message(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.message.role == Role::User)
            .map(|e| e.message.content.as_str())
    }
}

/// Guard returned by [`ConversationHistory::scoped_instruction`].
///
/// Derefs to the history so model calls can run against it while the
/// temporary instruction is in place.
pub struct ScopedInstruction<'a> {
    history: &'a mut ConversationHistory,
    saved: Option<String>,
}

impl Deref for ScopedInstruction<'_> {
    type Target = ConversationHistory;

    fn deref(&self) -> &Self::Target {
        &*self.history
    }
}

impl DerefMut for ScopedInstruction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.history
    }
}

impl Drop for ScopedInstruction<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.history.set_system_instruction(saved);
        }
    }
}
