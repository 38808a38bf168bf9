//! # Blossom Core
//!
//! Domain types, traits, and error definitions for the Blossom customer
//! assistant. This crate has **zero framework dependencies** — it defines the
//! domain model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The model and embedding backends are traits here; implementations live
//! in `blossom-providers`. Conversation state ([`ConversationHistory`]) and
//! tool dispatch ([`ToolRegistry`]) are plain values owned by whoever runs
//! the conversation, so tests can drive them with scripted providers.

pub mod error;
pub mod history;
pub mod message;
pub mod provider;
pub mod token;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use history::{ConversationHistory, ScopedInstruction};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{FinishReason, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Required, ToolArgs, ToolHandler, ToolRegistry};
