//! Relational records: tasks, meetings and contacts.
//!
//! [`RecordStore`] owns CRUD for the three record tables. Timestamps are
//! stored as epoch seconds; list-valued columns hold JSON arrays.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Tasks
// ═══════════════════════════════════════════════════════════════════════

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    fn from_column(s: &str) -> StoreResult<Self> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(StoreError::CorruptColumn {
                column: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    fn from_column(s: &str) -> StoreResult<Self> {
        match s {
            "open" => Ok(Self::Open),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(StoreError::CorruptColumn {
                column: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: Priority,
    pub project: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    /// Where the task came from (`chat`, `meeting`, ...).
    pub source: String,
}

/// A stored task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: Priority,
    pub project: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
//  Meetings
// ═══════════════════════════════════════════════════════════════════════

/// Input for recording an analyzed meeting.
#[derive(Debug, Clone, Default)]
pub struct NewMeeting {
    pub title: String,
    pub summary: String,
    pub transcript: String,
    pub participants: Vec<String>,
    /// Action items as produced by the analysis step.
    pub action_items: serde_json::Value,
    pub key_decisions: Vec<String>,
    pub held_at: Option<DateTime<Utc>>,
}

/// A stored meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub transcript: String,
    pub participants: Vec<String>,
    pub action_items: serde_json::Value,
    pub key_decisions: Vec<String>,
    pub held_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
//  Contacts
// ═══════════════════════════════════════════════════════════════════════

/// Input for adding a contact.
#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub name: String,
    pub username: Option<String>,
    pub chat_id: Option<String>,
    pub aliases: Vec<String>,
}

/// A stored contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub chat_id: Option<String>,
    pub aliases: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
//  RecordStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD over the `tasks`, `meetings` and `contacts` tables.
#[derive(Clone)]
pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ── tasks ────────────────────────────────────────────────────────

    /// Insert a task and return it with its generated id.
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_task(&self, input: NewTask) -> StoreResult<Task> {
        if input.title.trim().is_empty() {
            return Err(StoreError::InvalidRecord {
                record: "task",
                reason: "title is empty".into(),
            });
        }

        let task = Task {
            id: Uuid::now_v7().to_string(),
            title: input.title.trim().to_string(),
            description: input.description,
            assignee: input.assignee,
            priority: input.priority,
            project: input.project,
            deadline: input.deadline,
            status: TaskStatus::Open,
            source: input.source,
            created_at: Utc::now(),
        };

        let row = task.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (id, title, description, assignee, priority, project, \
                     deadline, status, source, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    rusqlite::params![
                        row.id,
                        row.title,
                        row.description,
                        row.assignee,
                        row.priority.as_str(),
                        row.project,
                        row.deadline.map(|d| d.timestamp()),
                        row.status.as_str(),
                        row.source,
                        row.created_at.timestamp(),
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!(task_id = %task.id, "task created");
        Ok(task)
    }

    /// Fetch one task by id.
    #[instrument(skip(self))]
    pub async fn get_task(&self, id: &str) -> StoreResult<Task> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let raw = conn
                    .query_row(
                        &format!("{TASK_SELECT} WHERE id = ?1"),
                        [&id],
                        RawTask::from_row,
                    )
                    .optional()?;
                match raw {
                    Some(raw) => raw.into_task(),
                    None => Err(StoreError::TaskNotFound { id }),
                }
            })
            .await
    }

    /// Most recent tasks first.
    #[instrument(skip(self))]
    pub async fn list_tasks(&self, limit: u32) -> StoreResult<Vec<Task>> {
        self.db
            .execute(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("{TASK_SELECT} ORDER BY created_at DESC, id DESC LIMIT ?1"))?;
                let rows = stmt
                    .query_map([limit], RawTask::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(RawTask::into_task).collect()
            })
            .await
    }

    /// Change a task's status.
    #[instrument(skip(self))]
    pub async fn set_task_status(&self, id: &str, status: TaskStatus) -> StoreResult<()> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE tasks SET status = ?2 WHERE id = ?1",
                    rusqlite::params![id, status.as_str()],
                )?;
                if updated == 0 {
                    return Err(StoreError::TaskNotFound { id });
                }
                Ok(())
            })
            .await
    }

    // ── meetings ─────────────────────────────────────────────────────

    /// Insert an analyzed meeting.
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_meeting(&self, input: NewMeeting) -> StoreResult<Meeting> {
        let meeting = Meeting {
            id: Uuid::now_v7().to_string(),
            title: input.title,
            summary: input.summary,
            transcript: input.transcript,
            participants: input.participants,
            action_items: input.action_items,
            key_decisions: input.key_decisions,
            held_at: input.held_at,
            created_at: Utc::now(),
        };

        let participants = serde_json::to_string(&meeting.participants)?;
        let action_items = serde_json::to_string(&meeting.action_items)?;
        let key_decisions = serde_json::to_string(&meeting.key_decisions)?;
        let row = meeting.clone();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO meetings (id, title, summary, transcript, participants, \
                     action_items, key_decisions, held_at, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        row.id,
                        row.title,
                        row.summary,
                        row.transcript,
                        participants,
                        action_items,
                        key_decisions,
                        row.held_at.map(|d| d.timestamp()),
                        row.created_at.timestamp(),
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!(meeting_id = %meeting.id, "meeting recorded");
        Ok(meeting)
    }

    /// Fetch one meeting by id.
    #[instrument(skip(self))]
    pub async fn get_meeting(&self, id: &str) -> StoreResult<Meeting> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let raw = conn
                    .query_row(
                        &format!("{MEETING_SELECT} WHERE id = ?1"),
                        [&id],
                        RawMeeting::from_row,
                    )
                    .optional()?;
                match raw {
                    Some(raw) => raw.into_meeting(),
                    None => Err(StoreError::MeetingNotFound { id }),
                }
            })
            .await
    }

    /// The most recently recorded meeting, if any.
    #[instrument(skip(self))]
    pub async fn latest_meeting(&self) -> StoreResult<Option<Meeting>> {
        self.db
            .execute(|conn| {
                conn.query_row(
                    &format!(
                        "{MEETING_SELECT} ORDER BY COALESCE(held_at, created_at) DESC, id DESC LIMIT 1"
                    ),
                    [],
                    RawMeeting::from_row,
                )
                .optional()?
                .map(RawMeeting::into_meeting)
                .transpose()
            })
            .await
    }

    // ── contacts ─────────────────────────────────────────────────────

    /// Add a contact.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn add_contact(&self, input: NewContact) -> StoreResult<Contact> {
        if input.name.trim().is_empty() {
            return Err(StoreError::InvalidRecord {
                record: "contact",
                reason: "name is empty".into(),
            });
        }

        let contact = Contact {
            id: Uuid::now_v7().to_string(),
            name: input.name.trim().to_string(),
            username: input
                .username
                .map(|u| u.trim_start_matches('@').to_string()),
            chat_id: input.chat_id,
            aliases: input.aliases,
            created_at: Utc::now(),
        };

        let aliases = serde_json::to_string(&contact.aliases)?;
        let row = contact.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO contacts (id, name, username, chat_id, aliases, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        row.id,
                        row.name,
                        row.username,
                        row.chat_id,
                        aliases,
                        row.created_at.timestamp(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(contact)
    }

    /// All contacts, alphabetical.
    pub async fn list_contacts(&self) -> StoreResult<Vec<Contact>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, username, chat_id, aliases, created_at \
                     FROM contacts ORDER BY name",
                )?;
                let rows = stmt
                    .query_map([], RawContact::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(RawContact::into_contact).collect()
            })
            .await
    }

    /// Find a contact by free-text reference.
    ///
    /// Matches, in order of preference: full name, username (with or
    /// without `@`), an alias, then the first word of the name. Comparison
    /// is Unicode case-insensitive, which SQLite's `lower()` is not, so the
    /// filtering happens here rather than in SQL.
    #[instrument(skip(self))]
    pub async fn find_contact(&self, reference: &str) -> StoreResult<Option<Contact>> {
        let needle = reference.trim().trim_start_matches('@').to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let contacts = self.list_contacts().await?;
        let rank = |c: &Contact| -> Option<u8> {
            if c.name.to_lowercase() == needle {
                Some(0)
            } else if c.username.as_deref().map(str::to_lowercase).as_deref() == Some(needle.as_str()) {
                Some(1)
            } else if c.aliases.iter().any(|a| a.to_lowercase() == needle) {
                Some(2)
            } else if c
                .name
                .split_whitespace()
                .next()
                .is_some_and(|first| first.to_lowercase() == needle)
            {
                Some(3)
            } else {
                None
            }
        };

        Ok(contacts
            .into_iter()
            .filter_map(|c| rank(&c).map(|r| (r, c)))
            .min_by_key(|(r, _)| *r)
            .map(|(_, c)| c))
    }
}

// ── row mapping ──────────────────────────────────────────────────────

const TASK_SELECT: &str = "SELECT id, title, description, assignee, priority, project, \
                           deadline, status, source, created_at FROM tasks";

const MEETING_SELECT: &str = "SELECT id, title, summary, transcript, participants, \
                              action_items, key_decisions, held_at, created_at FROM meetings";

fn timestamp(secs: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::CorruptColumn {
            column: "timestamp",
            value: secs.to_string(),
        })
}

struct RawTask {
    id: String,
    title: String,
    description: Option<String>,
    assignee: Option<String>,
    priority: String,
    project: Option<String>,
    deadline: Option<i64>,
    status: String,
    source: String,
    created_at: i64,
}

impl RawTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            assignee: row.get(3)?,
            priority: row.get(4)?,
            project: row.get(5)?,
            deadline: row.get(6)?,
            status: row.get(7)?,
            source: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_task(self) -> StoreResult<Task> {
        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description,
            assignee: self.assignee,
            priority: Priority::from_column(&self.priority)?,
            project: self.project,
            deadline: self.deadline.map(timestamp).transpose()?,
            status: TaskStatus::from_column(&self.status)?,
            source: self.source,
            created_at: timestamp(self.created_at)?,
        })
    }
}

struct RawMeeting {
    id: String,
    title: String,
    summary: String,
    transcript: String,
    participants: String,
    action_items: String,
    key_decisions: String,
    held_at: Option<i64>,
    created_at: i64,
}

impl RawMeeting {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            summary: row.get(2)?,
            transcript: row.get(3)?,
            participants: row.get(4)?,
            action_items: row.get(5)?,
            key_decisions: row.get(6)?,
            held_at: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_meeting(self) -> StoreResult<Meeting> {
        Ok(Meeting {
            id: self.id,
            title: self.title,
            summary: self.summary,
            transcript: self.transcript,
            participants: serde_json::from_str(&self.participants)?,
            action_items: serde_json::from_str(&self.action_items)?,
            key_decisions: serde_json::from_str(&self.key_decisions)?,
            held_at: self.held_at.map(timestamp).transpose()?,
            created_at: timestamp(self.created_at)?,
        })
    }
}

struct RawContact {
    id: String,
    name: String,
    username: Option<String>,
    chat_id: Option<String>,
    aliases: String,
    created_at: i64,
}

impl RawContact {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            username: row.get(2)?,
            chat_id: row.get(3)?,
            aliases: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_contact(self) -> StoreResult<Contact> {
        Ok(Contact {
            id: self.id,
            name: self.name,
            username: self.username,
            chat_id: self.chat_id,
            aliases: serde_json::from_str(&self.aliases)?,
            created_at: timestamp(self.created_at)?,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> RecordStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        RecordStore::new(db)
    }

    #[tokio::test]
    async fn task_round_trip_keeps_optional_fields() {
        let store = store().await;
        let deadline = DateTime::from_timestamp(1_800_000_000, 0).unwrap();
        let created = store
            .create_task(NewTask {
                title: "  Prepare slides ".into(),
                assignee: Some("Anna".into()),
                priority: Priority::High,
                deadline: Some(deadline),
                source: "chat".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.title, "Prepare slides");
        let fetched = store.get_task(&created.id).await.unwrap();
        assert_eq!(fetched.assignee.as_deref(), Some("Anna"));
        assert_eq!(fetched.priority, Priority::High);
        assert_eq!(fetched.deadline, Some(deadline));
        assert_eq!(fetched.status, TaskStatus::Open);
        assert!(fetched.project.is_none());
    }

    #[tokio::test]
    async fn empty_task_title_is_rejected() {
        let store = store().await;
        let err = store
            .create_task(NewTask {
                title: "   ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { record: "task", .. }));
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let store = store().await;
        let err = store.get_task("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound { .. }));
        let err = store
            .set_task_status("nope", TaskStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn latest_meeting_is_newest() {
        let store = store().await;
        assert!(store.latest_meeting().await.unwrap().is_none());

        for (title, held) in [("old", 1_700_000_000), ("new", 1_700_100_000)] {
            store
                .create_meeting(NewMeeting {
                    title: title.into(),
                    summary: "s".into(),
                    transcript: "t".into(),
                    action_items: serde_json::json!([]),
                    held_at: DateTime::from_timestamp(held, 0),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let latest = store.latest_meeting().await.unwrap().unwrap();
        assert_eq!(latest.title, "new");
    }

    #[tokio::test]
    async fn contact_lookup_by_name_username_alias() {
        let store = store().await;
        store
            .add_contact(NewContact {
                name: "Иван Петров".into(),
                username: Some("@ivanp".into()),
                chat_id: Some("1001".into()),
                aliases: vec!["Ваня".into()],
            })
            .await
            .unwrap();

        for reference in ["иван петров", "@IvanP", "ваня", "Иван"] {
            let found = store.find_contact(reference).await.unwrap();
            assert_eq!(
                found.map(|c| c.chat_id),
                Some(Some("1001".to_string())),
                "reference {reference:?}"
            );
        }
        assert!(store.find_contact("Мария").await.unwrap().is_none());
        assert!(store.find_contact("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exact_name_beats_first_name() {
        let store = store().await;
        for (name, chat) in [("Anna Smith", "1"), ("Anna", "2")] {
            store
                .add_contact(NewContact {
                    name: name.into(),
                    chat_id: Some(chat.into()),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let found = store.find_contact("anna").await.unwrap().unwrap();
        assert_eq!(found.chat_id.as_deref(), Some("2"));
    }
}
