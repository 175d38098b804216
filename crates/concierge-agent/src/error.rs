//! Agent error types.
//!
//! Two layers: [`CollabError`] is what a collaborator (language model,
//! store, scheduler, knowledge provider) reports through [`CollabResult`];
//! [`AgentError`] is what an agent's own processing step returns. The
//! runner turns either into a user-presentable response.

use crate::types::AgentType;

/// Result of any call into an external collaborator.
pub type CollabResult<T> = std::result::Result<T, CollabError>;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollabError {
    /// The language model could not be reached or refused the request.
    #[error("language model unavailable: {reason}")]
    LlmUnavailable { reason: String },

    /// The language model answered with something that does not parse.
    #[error("language model returned invalid output: {reason}")]
    LlmInvalidOutput { reason: String },

    /// A retrieval or persistence store failed.
    #[error("store error: {reason}")]
    Store { reason: String },

    /// The scheduler rejected a job.
    #[error("scheduler error: {reason}")]
    Scheduler { reason: String },

    /// The knowledge-context provider failed.
    #[error("context provider error: {reason}")]
    Context { reason: String },

    /// The messaging channel could not deliver.
    #[error("delivery failed: {reason}")]
    Delivery { reason: String },
}

/// Unified error type for agent processing.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM client errors ---------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The LLM response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Processing errors ---------------------------------------------------
    /// A collaborator call failed and the agent cannot continue without it.
    #[error(transparent)]
    Collab(#[from] CollabError),

    /// The input does not carry what this agent needs.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A string did not name a known agent type.
    #[error("unknown agent type: {name}")]
    UnknownAgentType { name: String },

    /// No agent is mounted for the requested type.
    #[error("agent not mounted: {agent_type}")]
    NotMounted { agent_type: AgentType },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.
    #[error("internal agent error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}

impl From<AgentError> for CollabError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::LlmParseFailed { reason } => Self::LlmInvalidOutput { reason },
            AgentError::Collab(inner) => inner,
            other => Self::LlmUnavailable {
                reason: other.to_string(),
            },
        }
    }
}
