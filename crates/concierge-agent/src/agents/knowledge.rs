//! Explicit "remember this" requests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::base::{Agent, AgentRequest};
use crate::collab::RetrievalStore;
use crate::error::Result;
use crate::slots::KnowledgeSlots;
use crate::types::{Action, AgentOutcome, AgentType, Collection};

pub struct KnowledgeAgent {
    retrieval: Arc<dyn RetrievalStore>,
}

impl KnowledgeAgent {
    pub fn new(retrieval: Arc<dyn RetrievalStore>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Agent for KnowledgeAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Knowledge
    }

    fn context_collections(&self) -> &'static [Collection] {
        &[]
    }

    /// Writes the input to the knowledge collection itself, so the runner's
    /// indexing step is skipped.
    async fn process_with_context(&self, request: &AgentRequest) -> Result<AgentOutcome> {
        let slots = KnowledgeSlots::from_map(&request.classification.extracted_data);
        let doc_id = format!("knowledge-{}", Uuid::now_v7());

        self.retrieval
            .add(
                Collection::Knowledge,
                &doc_id,
                &request.input,
                json!({
                    "category": slots.category,
                    "keywords": slots.keywords,
                    "project": slots.project,
                    "source": request.classification.slot_str("chain_source").unwrap_or("chat"),
                }),
            )
            .await?;
        info!(doc_id = %doc_id, category = %slots.category, "knowledge saved");

        let keywords = if slots.keywords.is_empty() {
            "none".to_string()
        } else {
            slots.keywords.join(", ")
        };
        let response = format!(
            "🧠 Saved to the knowledge base.\nCategory: {}\nKeywords: {keywords}",
            slots.category
        );

        Ok(AgentOutcome::new(response)
            .with_action(
                Action::new("knowledge_saved")
                    .with("doc_id", doc_id.as_str())
                    .with("category", slots.category.as_str()),
            )
            .with_metadata("doc_id", doc_id)
            .with_metadata("category", slots.category)
            .with_metadata("keywords", slots.keywords)
            .without_indexing())
    }
}
