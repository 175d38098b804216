//! The six built-in agents.

mod default;
mod knowledge;
mod meeting;
mod message;
mod rag;
mod task;

use chrono::{DateTime, Utc};

pub use default::{APOLOGY, DefaultAgent};
pub use knowledge::KnowledgeAgent;
pub use meeting::MeetingAgent;
pub use message::MessageAgent;
pub use rag::RagQueryAgent;
pub use task::TaskAgent;

/// Timestamp as shown to users.
fn display_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}
