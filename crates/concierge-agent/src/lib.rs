//! Agent runtime for the concierge assistant.
//!
//! Each user message is handled by one of six agents. The [`AgentRunner`]
//! wraps every agent in the same pipeline: context sync, retrieval, the
//! agent's own step, optional indexing and response wrapping.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  AgentRunner  (sync → retrieve → delegate → index → wrap)│
//! └──────┬───────────────────────────────────────────────────┘
//!        │ dyn Agent
//!  ┌─────┴────┬─────────┬─────────┬───────────┬─────────┬─────────┐
//!  │  task    │ meeting │ message │ knowledge │ rag     │ default │
//!  └─────┬────┴────┬────┴────┬────┴─────┬─────┴────┬────┴────┬────┘
//!        │         │         │          │          │         │
//!  ┌─────┴─────────┴─────────┴──────────┴──────────┴─────────┴───┐
//!  │  collab traits: LanguageModel, RetrievalStore,              │
//!  │  PersistenceStore, Scheduler, KnowledgeProvider, ...        │
//!  └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] -- Intents, classifications, actions and responses.
//! - [`collab`] -- Capability traits for external collaborators.
//! - [`base`] -- The [`Agent`] trait and [`AgentRequest`].
//! - [`runner`] -- The shared five-step pipeline.
//! - [`agents`] -- The built-in agents.
//! - [`llm`] -- HTTP client for Anthropic and OpenAI-compatible APIs.
//! - [`clean`] -- Response cleaning.
//! - [`actions`] -- User-facing action labels.
//! - [`dates`] -- Free-text date resolution.
//! - [`slots`] -- Typed views over extracted slots.
//! - [`context`] -- People, projects, glossary and sync state.
//! - [`workflow`] -- LLM-backed meeting analysis.
//! - [`error`] -- Error types.

pub mod actions;
pub mod agents;
pub mod base;
pub mod clean;
pub mod collab;
pub mod context;
pub mod dates;
pub mod error;
pub mod llm;
pub mod runner;
pub mod slots;
pub mod types;
pub mod workflow;

// Re-export the most commonly used types at the crate root.
pub use actions::format_actions;
pub use agents::{
    DefaultAgent, KnowledgeAgent, MeetingAgent, MessageAgent, RagQueryAgent, TaskAgent,
};
pub use base::{Agent, AgentRequest, IndexRecord};
pub use clean::{PLACEHOLDER, clean_response};
pub use collab::{
    ActionItem, ContactRef, CreatedTask, GenerationOptions, KnowledgeProvider, LanguageModel,
    MeetingAnalysis, MeetingDraft, MeetingTranscript, MeetingWorkflow, Messenger,
    PersistenceStore, ResolvedEntities, RetrievalStore, RetrievedItem, ScheduledAction,
    ScheduledJob, Scheduler, TaskDraft, TaskPriority,
};
pub use context::{ContextDirectory, ContextSync, Person, Project};
pub use error::{AgentError, CollabError, CollabResult, Result};
pub use llm::{LlmClient, LlmClientConfig, LlmProvider};
pub use runner::{AgentRunner, RunnerConfig};
pub use types::{
    Action, AgentOutcome, AgentResponse, AgentType, Collection, IntentClassification, JsonMap,
};
pub use workflow::LlmMeetingWorkflow;
