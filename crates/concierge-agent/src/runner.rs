//! Shared processing pipeline around every agent.
//!
//! [`AgentRunner::process`] performs five steps for one agent invocation:
//!
//! 1. sync the knowledge context once per runner lifetime,
//! 2. retrieve similar items from the agent's context collections,
//! 3. delegate to [`Agent::process_with_context`],
//! 4. index the exchange when the outcome asks for it,
//! 5. wrap the outcome into an [`AgentResponse`].
//!
//! Every step is failure-isolated. Errors and panics raised by the agent
//! become an error response; the runner itself never fails.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::base::{Agent, AgentRequest};
use crate::clean::PLACEHOLDER;
use crate::collab::{KnowledgeProvider, RetrievalStore, RetrievedItem};
use crate::context::ContextSync;
use crate::types::{AgentOutcome, AgentResponse, IntentClassification, JsonMap};

/// Runner tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Similar items fetched per context collection.
    pub context_limit: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { context_limit: 2 }
    }
}

pub struct AgentRunner {
    retrieval: Arc<dyn RetrievalStore>,
    knowledge: Option<Arc<dyn KnowledgeProvider>>,
    sync: ContextSync,
    config: RunnerConfig,
}

impl AgentRunner {
    pub fn new(retrieval: Arc<dyn RetrievalStore>, config: RunnerConfig) -> Self {
        Self {
            retrieval,
            knowledge: None,
            sync: ContextSync::new(),
            config,
        }
    }

    /// Sync this provider before the first request.
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeProvider>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn context_synced(&self) -> bool {
        self.sync.is_synced()
    }

    /// Run `agent` on `input`. Always returns a response with non-empty text.
    pub async fn process(
        &self,
        agent: &dyn Agent,
        input: &str,
        classification: IntentClassification,
        sender: Option<&str>,
    ) -> AgentResponse {
        let agent_type = agent.agent_type();
        let started = Instant::now();

        if let Some(knowledge) = &self.knowledge {
            self.sync.ensure(knowledge.as_ref()).await;
        }

        let context = self.retrieve_context(agent, input).await;
        debug!(agent = %agent_type, context_items = context.len(), "context retrieved");

        let request = AgentRequest {
            input: input.to_string(),
            classification,
            context,
            sender: sender.map(str::to_string),
        };

        let outcome = match AssertUnwindSafe(agent.process_with_context(&request))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(agent = %agent_type, error = %e, "agent failed");
                return error_response(agent, e.to_string());
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(agent = %agent_type, panic = %message, "agent panicked");
                return error_response(agent, message);
            }
        };

        if outcome.should_save_to_index {
            self.index(agent, &request, &outcome).await;
        }

        info!(
            agent = %agent_type,
            actions = outcome.actions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "agent finished"
        );

        let response = if outcome.response.trim().is_empty() {
            PLACEHOLDER.to_string()
        } else {
            outcome.response
        };
        AgentResponse {
            agent_type,
            response,
            actions: outcome.actions,
            metadata: outcome.metadata,
        }
    }

    async fn retrieve_context(&self, agent: &dyn Agent, input: &str) -> Vec<RetrievedItem> {
        let limit = self.config.context_limit;
        if limit == 0 || input.trim().is_empty() {
            return Vec::new();
        }
        let searches = agent.context_collections().iter().map(|&collection| async move {
            match self.retrieval.search_similar(collection, input, limit).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(collection = %collection, error = %e, "context retrieval failed");
                    Vec::new()
                }
            }
        });
        join_all(searches).await.into_iter().flatten().collect()
    }

    async fn index(&self, agent: &dyn Agent, request: &AgentRequest, outcome: &AgentOutcome) {
        for record in agent.index_records(request, outcome) {
            if let Err(e) = self
                .retrieval
                .add(record.collection, &record.id, &record.content, record.metadata)
                .await
            {
                warn!(collection = %record.collection, id = %record.id, error = %e, "indexing failed");
            }
        }
    }
}

fn error_response(agent: &dyn Agent, message: String) -> AgentResponse {
    let mut metadata = JsonMap::new();
    metadata.insert("error".into(), Value::String(message.clone()));
    AgentResponse {
        agent_type: agent.agent_type(),
        response: format!("error while processing: {message}"),
        actions: Vec::new(),
        metadata,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "agent panicked".to_string()
    }
}
