//! The conversation engine for Blossom.
//!
//! A customer turn runs as:
//!
//! 1. **Receive** the customer's message into the session history
//! 2. **Send** history and tool schema to the primary model
//! 3. **If tool call**: dispatch it (FAQ lookup, preference filtering,
//!    therapist profile), append call and result, go back to step 2
//! 4. **If text**: record it and return it to the customer
//!
//! Preference filtering runs its own short sub-dialogues on the auxiliary
//! model through the same [`ChatOrchestrator`].

pub mod assistant;
pub mod filtering;
pub mod orchestrator;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assistant::{Assistant, system_prompt};
pub use filtering::{FilterCategory, FilterOutcome, FilteringAgent};
pub use orchestrator::ChatOrchestrator;
pub use tools::{ContextRetrieverTool, PreferenceTool, TherapistProfileTool};
