//! Meeting processing: explicit transcripts or the most recent meeting.

use std::fmt::Write as _;
use std::sync::Arc;

use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::base::{Agent, AgentRequest, IndexRecord, excerpt};
use crate::clean::clean_response;
use crate::collab::{KnowledgeProvider, MeetingDraft, MeetingWorkflow, PersistenceStore};
use crate::error::{AgentError, Result};
use crate::slots::MeetingSlots;
use crate::types::{Action, AgentOutcome, AgentResponse, AgentType, Collection};

/// Phrases that ask for the latest meeting rather than supplying one.
const RECENCY_PHRASES: [&str; 5] = ["последн", "недавн", "last", "latest", "recent"];
const SUMMARY_CHARS: usize = 500;

pub struct MeetingAgent {
    workflow: Arc<dyn MeetingWorkflow>,
    store: Arc<dyn PersistenceStore>,
    knowledge: Option<Arc<dyn KnowledgeProvider>>,
    recency: Option<AhoCorasick>,
}

/// Where the transcript came from.
struct Source {
    transcript: String,
    title: Option<String>,
    held_at: Option<DateTime<Utc>>,
}

impl MeetingAgent {
    pub fn new(workflow: Arc<dyn MeetingWorkflow>, store: Arc<dyn PersistenceStore>) -> Self {
        let recency = match AhoCorasick::new(RECENCY_PHRASES) {
            Ok(ac) => Some(ac),
            Err(e) => {
                error!(error = %e, "failed to build recency matcher");
                None
            }
        };
        Self {
            workflow,
            store,
            knowledge: None,
            recency,
        }
    }

    /// Source of "latest meeting" lookups.
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeProvider>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    fn asks_for_recent(&self, input: &str) -> bool {
        mentions_recency(self.recency.as_ref(), input)
    }

    async fn latest(&self) -> Result<Option<Source>> {
        let Some(knowledge) = &self.knowledge else {
            return Ok(None);
        };
        Ok(knowledge.latest_meeting().await?.map(|m| Source {
            transcript: m.transcript,
            title: Some(m.title),
            held_at: m.held_at,
        }))
    }
}

/// A recency phrase that starts a word: "last" matches "last week" but not
/// "elastic" or "blast".
fn mentions_recency(matcher: Option<&AhoCorasick>, input: &str) -> bool {
    let lower = input.to_lowercase();
    match matcher {
        Some(ac) => ac
            .find_overlapping_iter(&lower)
            .any(|m| starts_word(&lower, m.start())),
        None => RECENCY_PHRASES.iter().any(|p| {
            lower
                .match_indices(p)
                .any(|(at, _)| starts_word(&lower, at))
        }),
    }
}

fn starts_word(text: &str, at: usize) -> bool {
    !text[..at]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

#[async_trait]
impl Agent for MeetingAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Meeting
    }

    async fn process_with_context(&self, request: &AgentRequest) -> Result<AgentOutcome> {
        let slots = MeetingSlots::from_map(&request.classification.extracted_data);

        let source = if let Some(transcript) = slots.transcript {
            Source {
                transcript,
                title: None,
                held_at: None,
            }
        } else if self.asks_for_recent(&request.input) {
            match self.latest().await? {
                Some(source) => source,
                None => {
                    info!("no recent meeting available");
                    return Ok(AgentOutcome::new("No recent meeting was found to process.")
                        .with_metadata("meeting_found", false)
                        .without_indexing());
                }
            }
        } else {
            Source {
                transcript: request.input.clone(),
                title: None,
                held_at: None,
            }
        };

        if source.transcript.trim().is_empty() {
            return Err(AgentError::InvalidInput {
                reason: "meeting transcript is empty".into(),
            });
        }

        let analysis = self
            .workflow
            .analyze(&source.transcript, &request.context)
            .await?;
        let title = source.title.unwrap_or_else(|| analysis.title.clone());

        let meeting_id = self
            .store
            .create_meeting(MeetingDraft {
                title: title.clone(),
                summary: analysis.summary.clone(),
                transcript: source.transcript.clone(),
                participants: analysis.participants.clone(),
                action_items: analysis.action_items.clone(),
                key_decisions: analysis.key_decisions.clone(),
                held_at: source.held_at,
            })
            .await?;
        info!(meeting_id = %meeting_id, action_items = analysis.action_items.len(), "meeting processed");

        let summary = excerpt(&clean_response(&analysis.summary), SUMMARY_CHARS);
        let mut text = format!("🎯 Meeting processed: {title}\n\n{summary}");
        if !analysis.key_decisions.is_empty() {
            text.push_str("\n\nDecisions:");
            for d in &analysis.key_decisions {
                let _ = write!(text, "\n- {d}");
            }
        }
        if !analysis.action_items.is_empty() {
            text.push_str("\n\nAction items:");
            for item in &analysis.action_items {
                match &item.assignee {
                    Some(a) => {
                        let _ = write!(text, "\n- {} ({a})", item.text);
                    }
                    None => {
                        let _ = write!(text, "\n- {}", item.text);
                    }
                }
            }
        }

        let count = analysis.action_items.len();
        let mut outcome = AgentOutcome::new(text)
            .with_action(
                Action::new("meeting_processed")
                    .with("meeting_id", meeting_id.as_str())
                    .with("action_items_count", count),
            )
            .with_metadata("meeting_id", meeting_id.as_str())
            .with_metadata("meeting_title", title.as_str())
            .with_metadata("participants", analysis.participants.clone())
            .with_metadata("action_items", serde_json::to_value(&analysis.action_items)?)
            .with_metadata("action_items_count", count)
            .with_metadata("key_decisions", analysis.key_decisions.clone())
            .with_index_content(source.transcript);
        if let [project] = analysis.projects.as_slice() {
            outcome = outcome.with_metadata("project", project.as_str());
        }
        Ok(outcome)
    }

    /// The transcript goes to the meetings collection, keyed by meeting id.
    fn index_records(&self, request: &AgentRequest, outcome: &AgentOutcome) -> Vec<IndexRecord> {
        let Some(id) = outcome.metadata.get("meeting_id").and_then(Value::as_str) else {
            return Vec::new();
        };
        vec![IndexRecord {
            collection: Collection::Meetings,
            id: id.to_string(),
            content: outcome
                .index_content
                .clone()
                .unwrap_or_else(|| request.input.clone()),
            metadata: json!({
                "title": outcome.metadata.get("meeting_title"),
                "participants": outcome.metadata.get("participants"),
            }),
        }]
    }

    fn next_agents(&self, response: &AgentResponse) -> Vec<AgentType> {
        let items = response
            .metadata
            .get("action_items_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if items > 0 {
            vec![AgentType::Task]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> Option<AhoCorasick> {
        AhoCorasick::new(RECENCY_PHRASES).ok()
    }

    #[test]
    fn recency_phrases_match_at_word_start() {
        let ac = matcher();
        for input in [
            "Process the last meeting",
            "summarize the LATEST call",
            "What happened recently?",
            "Обработай последнюю встречу",
            "итоги недавнего созвона",
        ] {
            assert!(mentions_recency(ac.as_ref(), input), "input {input:?}");
            assert!(mentions_recency(None, input), "input {input:?}");
        }
    }

    #[test]
    fn recency_inside_words_is_ignored() {
        let ac = matcher();
        for input in [
            "Anna: the elastic cluster is fine",
            "Boris: the blast radius is small",
            "Team: the Atlas release slipped",
        ] {
            assert!(!mentions_recency(ac.as_ref(), input), "input {input:?}");
            assert!(!mentions_recency(None, input), "input {input:?}");
        }
    }
}
