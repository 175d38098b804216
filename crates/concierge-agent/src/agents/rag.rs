//! Questions answered from stored meetings, knowledge and tasks.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::base::{Agent, AgentRequest, excerpt};
use crate::clean::clean_response;
use crate::collab::{GenerationOptions, LanguageModel, RetrievalStore, RetrievedItem};
use crate::error::Result;
use crate::types::{Action, AgentOutcome, AgentType, Collection};

const SEARCH_LIMIT: usize = 3;
/// Items per collection in the fallback listing.
const LISTED: usize = 2;
const LISTED_CHARS: usize = 200;
const PROMPT_CHARS: usize = 600;

const SYSTEM_PROMPT: &str = "\
You answer questions using only the notes provided. Reply in the language \
of the question, briefly and in plain text. If the notes do not contain \
the answer, say so.";

pub struct RagQueryAgent {
    llm: Arc<dyn LanguageModel>,
    retrieval: Arc<dyn RetrievalStore>,
}

impl RagQueryAgent {
    pub fn new(llm: Arc<dyn LanguageModel>, retrieval: Arc<dyn RetrievalStore>) -> Self {
        Self { llm, retrieval }
    }

    async fn search(&self, collection: Collection, query: &str) -> Vec<RetrievedItem> {
        match self.retrieval.search_similar(collection, query, SEARCH_LIMIT).await {
            Ok(items) => items,
            Err(e) => {
                warn!(collection = %collection, error = %e, "search failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Agent for RagQueryAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::RagQuery
    }

    fn context_collections(&self) -> &'static [Collection] {
        &[]
    }

    async fn process_with_context(&self, request: &AgentRequest) -> Result<AgentOutcome> {
        let query = request.input.trim();
        let (meetings, knowledge, tasks) = futures::join!(
            self.search(Collection::Meetings, query),
            self.search(Collection::Knowledge, query),
            self.search(Collection::Tasks, query),
        );
        let groups = [
            (Collection::Meetings, meetings),
            (Collection::Knowledge, knowledge),
            (Collection::Tasks, tasks),
        ];
        let total: usize = groups.iter().map(|(_, items)| items.len()).sum();
        debug!(total, "search finished");

        let sources: Vec<_> = groups
            .iter()
            .flat_map(|(collection, items)| {
                items
                    .iter()
                    .map(move |i| json!({"collection": collection.as_str(), "id": i.id, "score": i.score}))
            })
            .collect();

        if total == 0 {
            return Ok(AgentOutcome::new("Nothing relevant was found in the knowledge base.")
                .with_action(Action::new("rag_search").with("results_count", 0))
                .with_metadata("query", query)
                .with_metadata("results_count", 0)
                .without_indexing());
        }

        let mut notes = String::new();
        for (collection, items) in &groups {
            for item in items {
                let _ = writeln!(notes, "[{collection}] {}", excerpt(&item.content, PROMPT_CHARS));
            }
        }
        let prompt = format!("Notes:\n{notes}\nQuestion: {query}");
        let options = GenerationOptions {
            temperature: 0.3,
            system: Some(SYSTEM_PROMPT.to_string()),
            ..Default::default()
        };

        let (text, synthesized) = match self.llm.generate_text(&prompt, &options).await {
            Ok(answer) => (clean_response(&answer), true),
            Err(e) => {
                warn!(error = %e, "answer synthesis failed, listing snippets");
                (listing(&groups), false)
            }
        };

        Ok(AgentOutcome::new(text)
            .with_action(Action::new("rag_search").with("results_count", total))
            .with_metadata("query", query)
            .with_metadata("results_count", total)
            .with_metadata("synthesized", synthesized)
            .with_metadata("sources", sources)
            .without_indexing())
    }
}

/// Deterministic answer: the top snippets of each collection.
fn listing(groups: &[(Collection, Vec<RetrievedItem>)]) -> String {
    let mut out = String::from("Found:");
    for (collection, items) in groups {
        if items.is_empty() {
            continue;
        }
        let heading = match collection {
            Collection::Meetings => "📅 Meetings",
            Collection::Knowledge => "📚 Knowledge",
            Collection::Tasks => "✅ Tasks",
        };
        let _ = write!(out, "\n\n{heading}:");
        for item in items.iter().take(LISTED) {
            let _ = write!(out, "\n- {}", excerpt(&item.content, LISTED_CHARS));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn listing_shows_two_per_collection() {
        let item = |c: &str| RetrievedItem {
            id: c.into(),
            content: c.into(),
            metadata: Value::Null,
            score: 1.0,
        };
        let groups = vec![
            (Collection::Meetings, vec![item("m1"), item("m2"), item("m3")]),
            (Collection::Knowledge, vec![]),
            (Collection::Tasks, vec![item("t1")]),
        ];
        let text = listing(&groups);
        assert!(text.contains("- m2"));
        assert!(!text.contains("m3"));
        assert!(!text.contains("Knowledge"));
        assert!(text.contains("✅ Tasks:\n- t1"));
    }
}
