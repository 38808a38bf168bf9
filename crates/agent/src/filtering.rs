//! Filtering Agent — turns a free-text preference into a filter update.
//!
//! Three model calls per utterance, all on the auxiliary model:
//!
//! 1. **Rephrase** the latest customer message into a standalone statement,
//!    using the live history under a temporary instruction
//! 2. **Classify** the statement into a [`FilterCategory`]
//! 3. **Handle** it in an isolated conversation that offers exactly one
//!    update tool and ends with a `Done` or `Error` sentinel

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use blossom_core::message::Role;
use blossom_core::{ConversationHistory, Required, Result, ToolArgs, ToolHandler, ToolRegistry};
use blossom_directory::{Attribute, PreferenceStore, TherapyType};
use tracing::{debug, info, warn};

use crate::orchestrator::ChatOrchestrator;

const REPHRASE_PROMPT: &str = "Rewrite the customer's latest message as one standalone \
statement of what they want from a therapist, using the earlier conversation to resolve \
references such as 'that one' or 'the same'. Reply with the statement only.";

const CLASSIFY_PROMPT: &str = "Classify the customer's statement into exactly one of these \
categories: gender, languages, patient_age_group, specialisations, price. Reply with the \
category name only. If none of them fit, reply with None.";

const SENTINEL_RULES: &str = "After the tool succeeds, reply with exactly: Done\n\
If the tool reports an error and the customer's wording cannot be matched to any option, \
reply with exactly: Error\n\
If the statement is too vague to act on, ask the customer one short clarifying question \
instead of calling the tool.";

/// What a preference statement is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCategory {
    Attribute(Attribute),
    Price,
    None,
}

impl FilterCategory {
    /// Parse the classifier's reply. Anything unrecognized is `None`.
    pub fn parse(reply: &str) -> Self {
        let normalized = reply
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_");

        match normalized.as_str() {
            "price" | "prices" | "rate" | "rates" => FilterCategory::Price,
            "language" => FilterCategory::Attribute(Attribute::Languages),
            "specialisation" | "specialization" | "specializations" => {
                FilterCategory::Attribute(Attribute::Specialisations)
            }
            "age_group" | "age" => FilterCategory::Attribute(Attribute::PatientAgeGroup),
            other => Attribute::from_key(other)
                .map(FilterCategory::Attribute)
                .unwrap_or(FilterCategory::None),
        }
    }
}

/// Result of handling one preference statement.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// A preference was set.
    Updated,
    /// A preference was withdrawn.
    Cleared,
    /// The handler finished without touching any preference.
    Unchanged,
    /// Text for the customer: a clarifying question or an apology.
    NeedsClarification(String),
}

type OutcomeSlot = Arc<Mutex<Option<FilterOutcome>>>;

fn record(slot: &OutcomeSlot, outcome: FilterOutcome) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
}

pub struct FilteringAgent {
    orchestrator: Arc<ChatOrchestrator>,
    model: String,
    preferences: Arc<tokio::sync::Mutex<PreferenceStore>>,
}

impl FilteringAgent {
    pub fn new(
        orchestrator: Arc<ChatOrchestrator>,
        model: impl Into<String>,
        preferences: Arc<tokio::sync::Mutex<PreferenceStore>>,
    ) -> Self {
        Self {
            orchestrator,
            model: model.into(),
            preferences,
        }
    }

    pub fn preferences(&self) -> &Arc<tokio::sync::Mutex<PreferenceStore>> {
        &self.preferences
    }

    /// Handle the latest customer message in `history` as a preference.
    ///
    /// `history` is only read; its system instruction is swapped for the
    /// rephrase call and restored afterwards.
    pub async fn run(&self, history: &mut ConversationHistory) -> Result<FilterOutcome> {
        let statement = self.rephrase(history).await?;
        let category = self.classify(&statement).await?;

        info!(?category, statement = %statement, "Preference statement classified");

        match category {
            FilterCategory::Attribute(attribute) => self.handle_attribute(attribute, &statement).await,
            FilterCategory::Price => self.handle_price(&statement).await,
            FilterCategory::None => Ok(FilterOutcome::NeedsClarification(format!(
                "I can narrow down our therapists by {}. Which of these matters to you?",
                category_list()
            ))),
        }
    }

    async fn rephrase(&self, history: &mut ConversationHistory) -> Result<String> {
        let mut scoped = history.scoped_instruction(REPHRASE_PROMPT);
        let statement = self
            .orchestrator
            .get_response(&mut scoped, None, &self.model, false)
            .await?;
        Ok(statement.trim().to_string())
    }

    async fn classify(&self, statement: &str) -> Result<FilterCategory> {
        let mut history = ConversationHistory::bounded(1);
        history.set_system_instruction(CLASSIFY_PROMPT);
        history.append(Role::User, statement)?;

        let reply = self
            .orchestrator
            .get_response(&mut history, None, &self.model, false)
            .await?;
        Ok(FilterCategory::parse(&reply))
    }

    async fn handle_attribute(&self, attribute: Attribute, statement: &str) -> Result<FilterOutcome> {
        let (options, current) = {
            let store = self.preferences.lock().await;
            (
                store.options(attribute),
                store.selected(attribute).map(str::to_string),
            )
        };

        let instruction = format!(
            "You record the customer's preferred therapist {label}.\n\
             Valid options: {options}.\n\
             Current preference: {current}.\n\
             Call update_{key} with the option that matches the customer's statement, \
             or with None if they no longer mind.\n{SENTINEL_RULES}",
            label = attribute.label(),
            options = options.join(", "),
            current = current.as_deref().unwrap_or("None"),
            key = attribute.key(),
        );

        let outcome = OutcomeSlot::default();
        let mut tools = ToolRegistry::new();
        tools.register(
            UpdateAttributeTool {
                attribute,
                preferences: self.preferences.clone(),
                outcome: outcome.clone(),
            },
            &format!("update_{}", attribute.key()),
            &format!("Set or clear the customer's preferred therapist {}", attribute.label()),
            &["value"],
            &["One of the valid options, or None to clear the preference"],
            Required::All,
        )?;

        let apology = || {
            format!(
                "Sorry, I couldn't find a therapist {} matching that. The options I have are: {}.",
                attribute.label(),
                options.join(", ")
            )
        };
        self.run_isolated(instruction, statement, &tools, outcome, apology)
            .await
    }

    async fn handle_price(&self, statement: &str) -> Result<FilterOutcome> {
        let current = self
            .preferences
            .lock()
            .await
            .price()
            .map(|p| {
                format!(
                    "{} sessions between {} and {}",
                    p.therapy_type, p.lower_bound, p.upper_bound
                )
            })
            .unwrap_or_else(|| "None".to_string());
        let types = therapy_type_list();

        let instruction = format!(
            "You record the customer's budget for therapy sessions.\n\
             Therapy types: {types}.\n\
             Current preference: {current}.\n\
             Call update_price with the therapy type and whichever bounds the customer gave, \
             as plain numbers. Use therapy_type None if they no longer have a budget.\n\
             {SENTINEL_RULES}"
        );

        let outcome = OutcomeSlot::default();
        let mut tools = ToolRegistry::new();
        tools.register(
            UpdatePriceTool {
                preferences: self.preferences.clone(),
                outcome: outcome.clone(),
            },
            "update_price",
            "Set or clear the customer's price range for one therapy type",
            &["upper_bound", "lower_bound", "therapy_type"],
            &[
                "Highest price per session the customer will pay",
                "Lowest price per session the customer wants",
                "One of individual, couples or family, or None to clear the budget",
            ],
            Required::Only(vec!["therapy_type".into()]),
        )?;

        let apology = || {
            format!(
                "Sorry, I couldn't work out that budget. I can filter prices for {types} therapy."
            )
        };
        self.run_isolated(instruction, statement, &tools, outcome, apology)
            .await
    }

    /// Run one handler conversation and read its sentinel.
    async fn run_isolated(
        &self,
        instruction: String,
        statement: &str,
        tools: &ToolRegistry,
        outcome: OutcomeSlot,
        apology: impl FnOnce() -> String,
    ) -> Result<FilterOutcome> {
        let mut history = ConversationHistory::new();
        history.set_system_instruction(instruction);
        history.append(Role::User, statement)?;

        let reply = self
            .orchestrator
            .get_response(&mut history, Some(tools), &self.model, false)
            .await?;
        let sentinel = reply.trim().trim_end_matches('.').to_ascii_lowercase();

        if sentinel == "done" {
            let recorded = outcome
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            Ok(recorded.unwrap_or(FilterOutcome::Unchanged))
        } else if sentinel.starts_with("error") {
            warn!(reply = %reply, "Preference handler gave up");
            Ok(FilterOutcome::NeedsClarification(apology()))
        } else {
            debug!(reply = %reply, "Preference handler asked for clarification");
            Ok(FilterOutcome::NeedsClarification(reply))
        }
    }
}

fn category_list() -> String {
    let mut labels: Vec<&str> = Attribute::ALL.iter().map(|a| a.label()).collect();
    labels.push("price");
    labels.join(", ")
}

fn therapy_type_list() -> String {
    TherapyType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The model says "None" (or nothing) when a preference is withdrawn.
fn is_withdrawal(value: Option<&str>) -> bool {
    value.is_none_or(|v| {
        let v = v.trim();
        v.is_empty() || v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("null")
    })
}

/// Read a price the model may have written as `$1,200` or `150.00`.
fn parse_amount(raw: Option<String>, name: &str) -> Option<f64> {
    let raw = raw?;
    if is_withdrawal(Some(&raw)) {
        return None;
    }
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
        _ => {
            warn!(bound = name, value = %raw, "Ignoring unreadable price bound");
            None
        }
    }
}

struct UpdateAttributeTool {
    attribute: Attribute,
    preferences: Arc<tokio::sync::Mutex<PreferenceStore>>,
    outcome: OutcomeSlot,
}

#[async_trait]
impl ToolHandler for UpdateAttributeTool {
    async fn invoke(&self, args: ToolArgs, _history: &mut ConversationHistory) -> Result<String> {
        let value = args.get_str("value");
        let mut store = self.preferences.lock().await;

        if is_withdrawal(value.as_deref()) {
            store.update(self.attribute, None)?;
            record(&self.outcome, FilterOutcome::Cleared);
        } else {
            store.update(self.attribute, value.as_deref())?;
            record(&self.outcome, FilterOutcome::Updated);
        }

        Ok(serde_json::json!({
            "status": "ok",
            "preference": self.attribute.key(),
            "value": store.selected(self.attribute),
        })
        .to_string())
    }
}

struct UpdatePriceTool {
    preferences: Arc<tokio::sync::Mutex<PreferenceStore>>,
    outcome: OutcomeSlot,
}

#[async_trait]
impl ToolHandler for UpdatePriceTool {
    async fn invoke(&self, args: ToolArgs, _history: &mut ConversationHistory) -> Result<String> {
        let therapy_type = args.get_str("therapy_type");
        let mut store = self.preferences.lock().await;

        if is_withdrawal(therapy_type.as_deref()) {
            store.clear_price();
            record(&self.outcome, FilterOutcome::Cleared);
            return Ok(serde_json::json!({"status": "ok", "price": null}).to_string());
        }

        let upper = parse_amount(args.get_str("upper_bound"), "upper_bound");
        let lower = parse_amount(args.get_str("lower_bound"), "lower_bound");
        store.update_price(upper, lower, therapy_type.as_deref().unwrap_or_default())?;
        record(&self.outcome, FilterOutcome::Updated);

        Ok(serde_json::json!({"status": "ok", "price": store.price()}).to_string())
    }
}
