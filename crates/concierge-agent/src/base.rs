//! The agent trait and the request it is handed.

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::collab::RetrievedItem;
use crate::error::Result;
use crate::types::{AgentOutcome, AgentResponse, AgentType, Collection, IntentClassification};

/// Everything an agent sees for one invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Raw user input, possibly grown by a chain excerpt.
    pub input: String,
    pub classification: IntentClassification,
    /// Similar items retrieved before the agent runs.
    pub context: Vec<RetrievedItem>,
    /// Originating chat or user id, if the transport knows it.
    pub sender: Option<String>,
}

impl AgentRequest {
    /// The first `limit` context items, each cut to `max_chars`.
    pub fn context_snippets(&self, limit: usize, max_chars: usize) -> Vec<String> {
        self.context
            .iter()
            .take(limit)
            .map(|item| excerpt(&item.content, max_chars))
            .collect()
    }
}

/// A document the runner writes to the retrieval store after processing.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub collection: Collection,
    pub id: String,
    pub content: String,
    pub metadata: Value,
}

/// One specialized handler.
///
/// Only [`Agent::process_with_context`] is required. The runner does context
/// sync, retrieval, indexing and error conversion around it.
#[async_trait]
pub trait Agent: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Collections searched for context before processing.
    fn context_collections(&self) -> &'static [Collection] {
        &[Collection::Meetings, Collection::Knowledge]
    }

    async fn process_with_context(&self, request: &AgentRequest) -> Result<AgentOutcome>;

    /// Records to index when the outcome asks for it. Defaults to the
    /// outcome's index content, or the raw input, in the knowledge collection.
    fn index_records(&self, request: &AgentRequest, outcome: &AgentOutcome) -> Vec<IndexRecord> {
        let agent_type = self.agent_type();
        vec![IndexRecord {
            collection: Collection::Knowledge,
            id: format!("{agent_type}-{}", Uuid::now_v7()),
            content: outcome
                .index_content
                .clone()
                .unwrap_or_else(|| request.input.clone()),
            metadata: json!({
                "agent_type": agent_type.as_str(),
                "actions": outcome.actions.iter().map(|a| a.kind.as_str()).collect::<Vec<_>>(),
            }),
        }]
    }

    /// Agents to run after this one, in order.
    fn next_agents(&self, _response: &AgentResponse) -> Vec<AgentType> {
        Vec::new()
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
