//! Error types for the cogloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each part of the fabric has its own error enum, returned directly by the
//! operations of that part.

use thiserror::Error;

/// Failures of a single bounded-channel operation.
///
/// None of these are fatal: `Full` is producer backpressure (the item was
/// dropped), `Empty` and `Timeout` mean the consumer found nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel is full, item dropped")]
    Full,

    #[error("channel is empty")]
    Empty,

    #[error("timed out waiting for an item")]
    Timeout,

    #[error("event kind '{0}' cannot be queued on the outbound bus")]
    Unroutable(&'static str),
}

/// Failures of the human-in-the-loop correlator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelatorError {
    #[error("a request is already pending ({pending_id})")]
    Busy { pending_id: String },

    #[error("question could not be published: {0}")]
    Undelivered(ChannelError),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

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

/// A failed decision pass. The loop logs it and keeps the history it had.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("decision produced an invalid history: {0}")]
    InvalidHistory(String),

    #[error("{0}")]
    Internal(String),
}
