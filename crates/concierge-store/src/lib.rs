//! # concierge-store
//!
//! SQLite persistence for the concierge assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────────┐
//! │  RecordStore             │  DocumentIndex               │
//! │  tasks/meetings/contacts │  meetings/knowledge/tasks    │
//! ├──────────────────────────┴──────────────────────────────┤
//! │  Database (rusqlite WAL, spawn_blocking)                │
//! │  Migrations (versioned, transactional)                  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use concierge_store::{Database, DocumentIndex, RecordStore};
//!
//! let db = Database::open_and_migrate("data/concierge.db").await?;
//! let records = RecordStore::new(db.clone());
//! let index = DocumentIndex::new(db);
//! ```

pub mod db;
pub mod documents;
pub mod error;
pub mod migration;
pub mod records;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use documents::{COLLECTIONS, DocumentIndex, ScoredDocument};
pub use error::{StoreError, StoreResult};
pub use records::{
    Contact, Meeting, NewContact, NewMeeting, NewTask, Priority, RecordStore, Task, TaskStatus,
};
