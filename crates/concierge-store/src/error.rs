//! Storage errors for records (tasks, meetings, contacts) and the document
//! index.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    // -- Database errors --
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A JSON column (participants, action items, aliases, metadata) failed
    /// to encode or decode.
    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The connection worker panicked, was cancelled, or found the
    /// connection mutex poisoned.
    #[error("storage worker failed: {0}")]
    Worker(String),

    // -- Record errors --
    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("meeting not found: {id}")]
    MeetingNotFound { id: String },

    /// A record was rejected before it reached the database.
    #[error("invalid {record}: {reason}")]
    InvalidRecord { record: &'static str, reason: String },

    /// A stored column holds a value this build does not understand.
    #[error("corrupt {column} column: {value}")]
    CorruptColumn { column: &'static str, value: String },

    // -- Document index errors --
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("document id is empty")]
    EmptyDocumentId,
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_record() {
        let err = StoreError::TaskNotFound { id: "t-1".into() };
        assert_eq!(err.to_string(), "task not found: t-1");

        let err = StoreError::InvalidRecord {
            record: "contact",
            reason: "name is empty".into(),
        };
        assert_eq!(err.to_string(), "invalid contact: name is empty");

        let err = StoreError::UnknownCollection("notes".into());
        assert_eq!(err.to_string(), "unknown collection: notes");
    }
}
