//! Intent engine error types.
//!
//! The classifier and the router never surface these to their callers:
//! classification errors become the fallback intent and agent errors become
//! error responses. The scheduler returns them directly.

/// Unified error type for the intent engine.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    // -- Classifier errors ---------------------------------------------------
    /// The model could not produce a classification.
    #[error("{reason}")]
    ClassificationFailed { reason: String },

    // -- Scheduler errors ----------------------------------------------------
    /// The referenced job does not exist.
    #[error("scheduled job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// A job with the same id is already registered.
    #[error("scheduled job already exists: {job_id}")]
    DuplicateJob { job_id: String },

    /// The scheduler loop is already running.
    #[error("scheduler is already running")]
    AlreadyRunning,

    // -- Upstream crate errors -----------------------------------------------
    /// An error propagated from the agent crate.
    #[error("agent error: {0}")]
    Agent(#[from] concierge_agent::AgentError),
}

/// Convenience alias used throughout the intent crate.
pub type Result<T> = std::result::Result<T, IntentError>;
