//! Capability traits for everything the agents consume but do not own.
//!
//! Every call returns [`CollabResult`], so each call site decides on the
//! spot whether a failure degrades the response or aborts the agent.
//! Implementations live elsewhere: the LLM client in [`crate::llm`], the
//! SQLite-backed stores and the scheduler in the application crates.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollabResult;
use crate::types::{Collection, JsonMap};

// ---------------------------------------------------------------------------
// Language model
// ---------------------------------------------------------------------------

/// Knobs for free-text generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Optional system prompt.
    pub system: Option<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            system: None,
        }
    }
}

/// Text and structured generation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate_text(&self, prompt: &str, options: &GenerationOptions)
    -> CollabResult<String>;

    /// Generate a JSON object shaped by `schema`.
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &Value,
        temperature: f32,
    ) -> CollabResult<JsonMap>;
}

// ---------------------------------------------------------------------------
// Retrieval store
// ---------------------------------------------------------------------------

/// One similarity-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
    pub score: f64,
}

/// Similarity search over the meetings, knowledge and tasks collections.
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    async fn search_similar(
        &self,
        collection: Collection,
        query: &str,
        limit: usize,
    ) -> CollabResult<Vec<RetrievedItem>>;

    async fn add(
        &self,
        collection: Collection,
        id: &str,
        content: &str,
        metadata: Value,
    ) -> CollabResult<()>;
}

// ---------------------------------------------------------------------------
// Persistence store
// ---------------------------------------------------------------------------

/// Task priority as understood by agents.
///
/// Deserialization is lenient: any word [`TaskPriority::parse`] does not
/// recognise becomes [`TaskPriority::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Lenient parse of model- or user-supplied priority words.
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "high" | "urgent" | "critical" | "высокий" | "высокая" | "срочно" | "срочная" => {
                Some(Self::High)
            }
            "medium" | "normal" | "средний" | "средняя" | "обычный" => Some(Self::Medium),
            "low" | "minor" | "низкий" | "низкая" => Some(Self::Low),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for TaskPriority {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(Self::parse).unwrap_or_default())
    }
}

/// A task to be persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: TaskPriority,
    pub project: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    /// `chat` for direct requests, `meeting` for chained items.
    pub source: String,
}

/// A persisted task as reported back to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub id: String,
    pub title: String,
    pub assignee: Option<String>,
    pub priority: TaskPriority,
    pub project: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

/// An analyzed meeting to be persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingDraft {
    pub title: String,
    pub summary: String,
    pub transcript: String,
    pub participants: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub key_decisions: Vec<String>,
    pub held_at: Option<DateTime<Utc>>,
}

/// A contact resolved to a delivery destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRef {
    pub name: String,
    /// Chat or channel identifier messages are delivered to.
    pub destination: String,
}

/// Relational records: tasks, meetings, contacts.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn create_task(&self, draft: TaskDraft) -> CollabResult<CreatedTask>;

    /// Persist a meeting and return its id.
    async fn create_meeting(&self, draft: MeetingDraft) -> CollabResult<String>;

    /// Resolve a free-text reference (name, `@username`, alias) to a contact.
    async fn find_contact(&self, reference: &str) -> CollabResult<Option<ContactRef>>;
}

// ---------------------------------------------------------------------------
// Scheduler and messaging
// ---------------------------------------------------------------------------

/// What a scheduled job does when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduledAction {
    SendMessage { destination: String, text: String },
}

/// A job registered with the [`Scheduler`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub id: String,
    pub execute_at: DateTime<Utc>,
    pub action: ScheduledAction,
    /// `None` for one-shot jobs.
    pub repeat_interval: Option<Duration>,
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, job: ScheduledJob) -> CollabResult<()>;
}

/// Outbound delivery channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver `text` and return the channel's message id.
    async fn send(&self, destination: &str, text: &str) -> CollabResult<String>;
}

// ---------------------------------------------------------------------------
// Knowledge context
// ---------------------------------------------------------------------------

/// People and projects mentioned in a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntities {
    pub people: Vec<String>,
    pub projects: Vec<String>,
}

impl ResolvedEntities {
    pub fn is_empty(&self) -> bool {
        self.people.is_empty() && self.projects.is_empty()
    }
}

/// A meeting transcript fetched from the knowledge source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingTranscript {
    pub id: String,
    pub title: String,
    pub transcript: String,
    pub held_at: Option<DateTime<Utc>>,
}

/// Shared relational context: people, projects, glossary, recent meetings.
#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    /// Refresh the context from its source. Safe to call repeatedly.
    async fn ensure_synced(&self) -> CollabResult<()>;

    async fn resolve_entities(&self, text: &str) -> CollabResult<ResolvedEntities>;

    /// Glossary `(term, definition)` pairs whose term occurs in `text`.
    async fn glossary_terms(&self, text: &str) -> CollabResult<Vec<(String, String)>>;

    async fn latest_meeting(&self) -> CollabResult<Option<MeetingTranscript>>;
}

// ---------------------------------------------------------------------------
// Meeting workflow
// ---------------------------------------------------------------------------

/// One follow-up extracted from a meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub text: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Free-text deadline as spoken in the meeting.
    #[serde(default)]
    pub deadline: Option<String>,
}

/// Structured analysis of a meeting transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingAnalysis {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
}

/// Heavy meeting analysis delegated out of the meeting agent.
#[async_trait]
pub trait MeetingWorkflow: Send + Sync {
    async fn analyze(
        &self,
        transcript: &str,
        similar: &[RetrievedItem],
    ) -> CollabResult<MeetingAnalysis>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parse_handles_both_languages() {
        assert_eq!(TaskPriority::parse("High"), Some(TaskPriority::High));
        assert_eq!(TaskPriority::parse("срочно"), Some(TaskPriority::High));
        assert_eq!(TaskPriority::parse(" низкий "), Some(TaskPriority::Low));
        assert_eq!(TaskPriority::parse("whenever"), None);
    }

    #[test]
    fn action_item_defaults_missing_fields() {
        let item: ActionItem = serde_json::from_str(r#"{"text": "Book room"}"#).unwrap();
        assert_eq!(item.priority, TaskPriority::Medium);
        assert!(item.assignee.is_none());

        let item: ActionItem =
            serde_json::from_str(r#"{"text": "Ship", "priority": "High"}"#).unwrap();
        assert_eq!(item.priority, TaskPriority::High);
        let item: ActionItem =
            serde_json::from_str(r#"{"text": "Ship", "priority": null}"#).unwrap();
        assert_eq!(item.priority, TaskPriority::Medium);
    }

    #[test]
    fn scheduled_action_is_tagged() {
        let action = ScheduledAction::SendMessage {
            destination: "42".into(),
            text: "hi".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "send_message");
    }
}
