//! Error types for the Pennywise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.

use thiserror::Error;

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

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// Field-level validation failures for financial records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("amount must be greater than 0 (got {0})")]
    NonPositiveAmount(f64),

    #[error("amount must be a finite number")]
    NonFiniteAmount,

    #[error("unknown category '{0}' (expected one of: food, transport, entertainment, shopping, bills, other)")]
    UnknownCategory(String),

    #[error("description must be between 1 and {max} characters (got {len})")]
    DescriptionLength { len: usize, max: usize },
}

/// Why raw model output could not be turned into a decision.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("model output is not valid decision JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),
}
