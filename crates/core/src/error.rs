//! Error types for the Blossom domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The top-level [`Error`]
//! carries the turn-level failure kinds directly; each bounded context
//! (provider calls, tool dispatch, on-disk storage) has its own error enum
//! wrapped by a variant.

use thiserror::Error;

use crate::message::Role;

/// The top-level error type for all Blossom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Turn-fatal model errors ---
    /// Input or output exceeded a hard size limit.
    #[error("Token limit exceeded: {0}")]
    TokenLimit(String),

    /// The provider rejected the content.
    #[error("Content violates provider policies: {0}")]
    PolicyViolation(String),

    /// The provider returned something we do not understand.
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),

    // --- Usage errors ---
    #[error("Invalid role {0:?}: must be one of 'user' or 'assistant'")]
    InvalidRole(Role),

    #[error("No. of arguments and descriptions are not consistent ({names} arguments, {descriptions} descriptions)")]
    ArgumentCountMismatch { names: usize, descriptions: usize },

    // --- Recoverable ---
    /// A preference value is not one of the known options. `suggestions`
    /// holds every known option, closest to `input` first.
    #[error("Invalid option '{input}', closest options: {}", suggestions.join(", "))]
    InvalidOption {
        input: String,
        suggestions: Vec<String>,
    },

    // --- Bounded contexts ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller should turn this error into a clarification
    /// instead of aborting the turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidOption { .. })
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Corrupted data in {path}: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
