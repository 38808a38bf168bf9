//! Tool Registry — named callables the model may invoke.
//!
//! A tool is registered together with a name, a description and its string
//! parameters; the registry turns that into the JSON schema the model sees
//! and dispatches the model's JSON arguments back to the handler.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::{Error, Result, ToolError};
use crate::history::ConversationHistory;
use crate::provider::ToolDefinition;

/// Keyword arguments decoded from the model's JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(serde_json::Map<String, serde_json::Value>);

impl ToolArgs {
    /// Decode a JSON object. An empty string means no arguments.
    pub fn parse(args_json: &str) -> Result<Self> {
        if args_json.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str::<serde_json::Value>(args_json)? {
            serde_json::Value::Object(map) => Ok(Self(map)),
            other => Err(ToolError::InvalidArguments(format!(
                "expected a JSON object, got {other}"
            ))
            .into()),
        }
    }

    /// A string argument. Non-string scalars are stringified; `null` and
    /// missing arguments are `None`.
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// A required string argument.
    pub fn require_str(&self, name: &str) -> Result<String> {
        self.get_str(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{name}' argument")).into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The callable behind a registered tool.
///
/// Handlers receive the history of the conversation that requested the
/// call, so tools that need conversational context (the latest customer
/// message, a rephrase of it) read it from there.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, args: ToolArgs, history: &mut ConversationHistory) -> Result<String>;
}

/// Which parameters the model must always supply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Required {
    /// Every declared parameter.
    #[default]
    All,
    /// Only the listed parameters.
    Only(Vec<String>),
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Box<dyn ToolHandler>,
}

/// A registry of available tools.
///
/// The orchestrator uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Dispatch the model's tool calls to their handlers
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    ///
    /// Every parameter is typed as a string.
    pub fn register(
        &mut self,
        handler: impl ToolHandler + 'static,
        name: &str,
        description: &str,
        parameter_names: &[&str],
        parameter_descriptions: &[&str],
        required: Required,
    ) -> Result<()> {
        if parameter_names.len() != parameter_descriptions.len() {
            return Err(Error::ArgumentCountMismatch {
                names: parameter_names.len(),
                descriptions: parameter_descriptions.len(),
            });
        }

        let required: Vec<String> = match required {
            Required::All => parameter_names.iter().map(|n| n.to_string()).collect(),
            Required::Only(names) => names,
        };

        let properties: serde_json::Map<String, serde_json::Value> = parameter_names
            .iter()
            .zip(parameter_descriptions)
            .map(|(name, description)| {
                (
                    name.to_string(),
                    serde_json::json!({
                        "type": "string",
                        "description": description,
                    }),
                )
            })
            .collect();

        let definition = ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }),
        };

        self.tools.insert(
            name.to_string(),
            RegisteredTool {
                definition,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Remove a tool. Unknown names are ignored.
    pub fn unregister(&mut self, name: &str) {
        self.tools.remove(name);
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// Parse `args_json` and call the named tool with it.
    pub async fn invoke(
        &self,
        name: &str,
        args_json: &str,
        history: &mut ConversationHistory,
    ) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let args = ToolArgs::parse(args_json)?;
        tool.handler.invoke(args, history).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
