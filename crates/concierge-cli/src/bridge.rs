//! Store bridges: expose the SQLite stores through the agents' capability
//! traits.
//!
//! [`RecordBridge`] maps [`RecordStore`] onto [`PersistenceStore`] and
//! [`IndexBridge`] maps [`DocumentIndex`] onto [`RetrievalStore`]. Both
//! convert between the store-side and agent-side record types and turn
//! [`StoreError`] into [`CollabError::Store`].

use async_trait::async_trait;
use serde_json::Value;

use concierge_agent::{
    Collection, CollabError, CollabResult, ContactRef, CreatedTask, MeetingDraft,
    PersistenceStore, RetrievalStore, RetrievedItem, TaskDraft, TaskPriority,
};
use concierge_store::{Contact, DocumentIndex, NewMeeting, NewTask, Priority, RecordStore, StoreError};

fn store_error(err: StoreError) -> CollabError {
    CollabError::Store {
        reason: err.to_string(),
    }
}

fn to_store_priority(priority: TaskPriority) -> Priority {
    match priority {
        TaskPriority::High => Priority::High,
        TaskPriority::Medium => Priority::Medium,
        TaskPriority::Low => Priority::Low,
    }
}

fn to_agent_priority(priority: Priority) -> TaskPriority {
    match priority {
        Priority::High => TaskPriority::High,
        Priority::Medium => TaskPriority::Medium,
        Priority::Low => TaskPriority::Low,
    }
}

/// Where messages for `contact` are delivered: chat id, then `@username`,
/// then the plain name.
fn destination(contact: &Contact) -> String {
    contact
        .chat_id
        .clone()
        .or_else(|| contact.username.as_ref().map(|u| format!("@{u}")))
        .unwrap_or_else(|| contact.name.clone())
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

pub struct RecordBridge {
    records: RecordStore,
}

impl RecordBridge {
    pub fn new(records: RecordStore) -> Self {
        Self { records }
    }
}

#[async_trait]
impl PersistenceStore for RecordBridge {
    async fn create_task(&self, draft: TaskDraft) -> CollabResult<CreatedTask> {
        let task = self
            .records
            .create_task(NewTask {
                title: draft.title,
                description: draft.description,
                assignee: draft.assignee,
                priority: to_store_priority(draft.priority),
                project: draft.project,
                deadline: draft.deadline,
                source: draft.source,
            })
            .await
            .map_err(store_error)?;
        Ok(CreatedTask {
            id: task.id,
            title: task.title,
            assignee: task.assignee,
            priority: to_agent_priority(task.priority),
            project: task.project,
            deadline: task.deadline,
        })
    }

    async fn create_meeting(&self, draft: MeetingDraft) -> CollabResult<String> {
        let action_items = serde_json::to_value(&draft.action_items).map_err(|e| {
            CollabError::Store {
                reason: e.to_string(),
            }
        })?;
        let meeting = self
            .records
            .create_meeting(NewMeeting {
                title: draft.title,
                summary: draft.summary,
                transcript: draft.transcript,
                participants: draft.participants,
                action_items,
                key_decisions: draft.key_decisions,
                held_at: draft.held_at,
            })
            .await
            .map_err(store_error)?;
        Ok(meeting.id)
    }

    async fn find_contact(&self, reference: &str) -> CollabResult<Option<ContactRef>> {
        let contact = self
            .records
            .find_contact(reference)
            .await
            .map_err(store_error)?;
        Ok(contact.map(|c| ContactRef {
            destination: destination(&c),
            name: c.name,
        }))
    }
}

// ---------------------------------------------------------------------------
// Document index
// ---------------------------------------------------------------------------

pub struct IndexBridge {
    index: DocumentIndex,
}

impl IndexBridge {
    pub fn new(index: DocumentIndex) -> Self {
        Self { index }
    }
}

#[async_trait]
impl RetrievalStore for IndexBridge {
    async fn search_similar(
        &self,
        collection: Collection,
        query: &str,
        limit: usize,
    ) -> CollabResult<Vec<RetrievedItem>> {
        let hits = self
            .index
            .search(collection.as_str(), query, limit)
            .await
            .map_err(store_error)?;
        Ok(hits
            .into_iter()
            .map(|doc| RetrievedItem {
                id: doc.id,
                content: doc.content,
                metadata: doc.metadata,
                score: doc.score,
            })
            .collect())
    }

    async fn add(
        &self,
        collection: Collection,
        id: &str,
        content: &str,
        metadata: Value,
    ) -> CollabResult<()> {
        self.index
            .add(collection.as_str(), id, content, metadata)
            .await
            .map_err(store_error)
    }
}
