//! Research pipeline error types
//!
//! Errors are grouped by how far they travel:
//! - `ModelInvocationError` aborts the session and reaches the caller verbatim
//! - `SearchTaskError` stays inside the search stage (the task is dropped)
//! - `DeliveryError` becomes a `DeliveryOutcome::Failure` on a finished session

use crate::research::session::ResearchPhase;
use thiserror::Error;

/// A staged model call failed or produced output of the wrong shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelInvocationError {
    /// No API key was configured for the model provider
    #[error("GEMINI_API_KEY is not set or is empty. Please set it to use the Gemini API.")]
    MissingApiKey,

    /// The HTTP request could not be sent or its body could not be read
    #[error("Failed to reach Gemini API: {0}")]
    Transport(String),

    /// The provider rejected the call because of rate limiting
    #[error("Gemini API rate limit exceeded (HTTP 429): {0}")]
    RateLimited(String),

    /// The provider answered with a non-success status
    #[error("Gemini API returned error status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// The provider refused to answer the prompt
    #[error("Gemini API blocked the prompt: {0}")]
    Blocked(String),

    /// The response carried no usable text
    #[error("Gemini API response contains no content: {0}")]
    EmptyResponse(String),

    /// The response text does not conform to the requested output shape
    #[error("Model output does not match the expected shape: {0}")]
    MalformedOutput(String),
}

/// A single search task failed
///
/// Never escapes the search stage; the task's result slot is simply left empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchTaskError {
    /// The search capability reported a failure
    #[error("Search failed: {0}")]
    Failed(String),

    /// The task did not finish before its deadline
    #[error("Search timed out after {0} seconds")]
    TimedOut(u64),

    /// The spawned task panicked or was cancelled
    #[error("Search task aborted: {0}")]
    Aborted(String),
}

impl From<ModelInvocationError> for SearchTaskError {
    fn from(error: ModelInvocationError) -> Self {
        SearchTaskError::Failed(error.to_string())
    }
}

/// The delivery transport could not be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Credentials or addresses are missing
    #[error("Email delivery is not configured: {0}")]
    NotConfigured(String),

    /// The request never produced a status code
    #[error("Failed to reach email service: {0}")]
    Transport(String),
}

/// Orchestrator-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResearchError {
    /// A stage's model call failed; fatal to the session
    #[error(transparent)]
    Model(#[from] ModelInvocationError),

    /// The session cannot move between these phases
    #[error("Invalid research phase transition from {from} to {to}")]
    InvalidTransition {
        /// Phase the session was in
        from: ResearchPhase,
        /// Phase that was requested
        to: ResearchPhase,
    },

    /// Caller-supplied input was rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An operation needed a session but none has been started
    #[error("No research session is active. Start one with a query first.")]
    NoActiveSession,

    /// The orchestrator reached a state its own stages should never produce
    #[error("Internal research error: {0}")]
    Internal(String),
}
