//! Error types for the npcmind domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; they all roll up into
//! [`PipelineError`], which is what callers of the pipeline see.

use thiserror::Error;

/// The top-level error returned by a pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    // --- Request-side errors ---
    #[error("Compilation error: {0}")]
    Compilation(#[from] CompilationError),

    // --- Backend errors ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Response-side errors ---
    #[error("Model returned no choices")]
    EmptyChoices,

    #[error("Unrecognized response shape: {preview}")]
    UnrecognizedResponseShape { preview: String },

    #[error("Response contained no recognized records")]
    NoValidRecords,

    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },

    // --- Terminal ---
    #[error("Retries exhausted after {attempts} attempts (last: {last_reason})")]
    RetriesExhausted { attempts: u32, last_reason: String },
}

impl PipelineError {
    /// Whether this failure consumes one attempt instead of aborting the run.
    ///
    /// Only the three response-side "try again" conditions qualify. A
    /// malformed payload is terminal even though it looks transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmptyChoices | Self::UnrecognizedResponseShape { .. } | Self::NoValidRecords
        )
    }
}

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

// --- Bounded context errors ---

/// Failure to turn a history entry into a prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("unknown query type: {0}")]
    UnknownQueryType(String),

    #[error("system entry has no `query` key")]
    MissingQueryKey,

    #[error("action #{index} is not a record")]
    InvalidActionElement { index: usize },

    #[error("unknown perception category: {0}")]
    InvalidPerceptionCategory(String),

    #[error("invalid perception shape: {0}")]
    InvalidPerceptionShape(String),

    #[error("character entry has no `action` key")]
    MissingActionKey,

    #[error("entry content is not a record: {0}")]
    InvalidContent(String),
}

/// Failure reported by a [`crate::gateway::ModelGateway`].
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled by caller")]
    Cancelled,
}

/// Failure reported by a [`crate::sink::DiagnosticSink`]. Never fatal.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Transcript serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
