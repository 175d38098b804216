//! Meeting analysis through the language model.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::collab::{
    KnowledgeProvider, LanguageModel, MeetingAnalysis, MeetingWorkflow, RetrievedItem,
};
use crate::error::{CollabError, CollabResult};

/// Similar meetings included in the prompt.
const MAX_SIMILAR: usize = 3;
/// Characters of each similar meeting included in the prompt.
const SIMILAR_PREVIEW_CHARS: usize = 800;
const ANALYSIS_TEMPERATURE: f32 = 0.3;

const INSTRUCTIONS: &str = "\
You analyze meeting transcripts for a personal assistant. Reply in the \
language of the transcript. Produce a short title, a summary of at most a \
few paragraphs, the participants, the projects discussed, concrete action \
items (each with an assignee, a priority of high, medium or low, and a \
deadline exactly as spoken, or null) and the key decisions.";

/// [`MeetingWorkflow`] backed by structured generation.
pub struct LlmMeetingWorkflow {
    llm: Arc<dyn LanguageModel>,
    knowledge: Option<Arc<dyn KnowledgeProvider>>,
}

impl LlmMeetingWorkflow {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            knowledge: None,
        }
    }

    /// Mention known people and projects in the analysis prompt.
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeProvider>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    fn schema() -> Value {
        let string_list = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "summary": {"type": "string"},
                "participants": string_list,
                "projects": string_list,
                "action_items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "text": {"type": "string"},
                            "assignee": {"type": ["string", "null"]},
                            "priority": {"type": "string", "enum": ["high", "medium", "low"]},
                            "deadline": {"type": ["string", "null"]}
                        },
                        "required": ["text"]
                    }
                },
                "key_decisions": string_list
            },
            "required": ["summary", "action_items"]
        })
    }

    async fn build_prompt(&self, transcript: &str, similar: &[RetrievedItem]) -> String {
        let mut prompt = String::from(INSTRUCTIONS);

        if let Some(knowledge) = &self.knowledge {
            match knowledge.resolve_entities(transcript).await {
                Ok(entities) if !entities.is_empty() => {
                    prompt.push_str("\n\nKnown entities mentioned:\n");
                    for person in &entities.people {
                        let _ = writeln!(prompt, "- person: {person}");
                    }
                    for project in &entities.projects {
                        let _ = writeln!(prompt, "- project: {project}");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "entity resolution failed, analyzing without it"),
            }
        }

        if !similar.is_empty() {
            prompt.push_str("\n\nSimilar past meetings, for comparison:\n");
            for (i, item) in similar.iter().take(MAX_SIMILAR).enumerate() {
                let preview: String = item.content.chars().take(SIMILAR_PREVIEW_CHARS).collect();
                let _ = writeln!(prompt, "{}. {preview}", i + 1);
            }
        }

        let _ = write!(prompt, "\n\nTranscript:\n{transcript}");
        prompt
    }
}

#[async_trait]
impl MeetingWorkflow for LlmMeetingWorkflow {
    async fn analyze(
        &self,
        transcript: &str,
        similar: &[RetrievedItem],
    ) -> CollabResult<MeetingAnalysis> {
        let prompt = self.build_prompt(transcript, similar).await;
        debug!(prompt_len = prompt.len(), similar = similar.len(), "analyzing meeting");

        let raw = self
            .llm
            .generate_structured(&prompt, &Self::schema(), ANALYSIS_TEMPERATURE)
            .await?;
        let mut analysis: MeetingAnalysis =
            serde_json::from_value(Value::Object(raw)).map_err(|e| {
                CollabError::LlmInvalidOutput {
                    reason: format!("meeting analysis: {e}"),
                }
            })?;

        normalize(&mut analysis);
        info!(
            action_items = analysis.action_items.len(),
            participants = analysis.participants.len(),
            "meeting analyzed"
        );
        Ok(analysis)
    }
}

/// Drop blank items and make sure every assignee is listed as a participant.
fn normalize(analysis: &mut MeetingAnalysis) {
    analysis.title = analysis.title.trim().to_string();
    if analysis.title.is_empty() {
        analysis.title = "Meeting".to_string();
    }
    analysis.action_items.retain(|item| !item.text.trim().is_empty());
    analysis.key_decisions.retain(|d| !d.trim().is_empty());

    let assignees: Vec<String> = analysis
        .action_items
        .iter()
        .filter_map(|item| item.assignee.clone())
        .filter(|a| !a.trim().is_empty())
        .collect();
    for name in assignees {
        if !analysis.participants.iter().any(|p| p.eq_ignore_ascii_case(&name)) {
            analysis.participants.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::collab::{GenerationOptions, TaskPriority};
    use crate::types::JsonMap;

    struct CannedModel {
        reply: Value,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn generate_text(&self, _: &str, _: &GenerationOptions) -> CollabResult<String> {
            Ok(String::new())
        }

        async fn generate_structured(&self, prompt: &str, _: &Value, _: f32) -> CollabResult<JsonMap> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Value::Object(map) => Ok(map.clone()),
                _ => Err(CollabError::LlmInvalidOutput {
                    reason: "not an object".into(),
                }),
            }
        }
    }

    fn model(reply: Value) -> Arc<CannedModel> {
        Arc::new(CannedModel {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn analysis_is_normalized() {
        let llm = model(json!({
            "title": " ",
            "summary": "Agreed on launch date",
            "participants": ["Anna"],
            "action_items": [
                {"text": "Prepare slides", "assignee": "Boris", "priority": "High"},
                {"text": "  "},
                {"text": "Book venue", "assignee": "anna"}
            ],
            "key_decisions": ["Launch in May", ""]
        }));
        let workflow = LlmMeetingWorkflow::new(llm.clone());
        let similar = vec![RetrievedItem {
            id: "m1".into(),
            content: "Previous sync about the launch".into(),
            metadata: Value::Null,
            score: 1.0,
        }];

        let analysis = workflow.analyze("transcript text", &similar).await.unwrap();
        assert_eq!(analysis.title, "Meeting");
        assert_eq!(analysis.action_items.len(), 2);
        assert_eq!(analysis.action_items[0].priority, TaskPriority::High);
        assert_eq!(analysis.participants, vec!["Anna", "Boris"]);
        assert_eq!(analysis.key_decisions, vec!["Launch in May"]);

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("1. Previous sync about the launch"));
        assert!(prompts[0].ends_with("transcript text"));
    }

    #[tokio::test]
    async fn wrong_shape_is_invalid_output() {
        let workflow = LlmMeetingWorkflow::new(model(json!({"action_items": "none"})));
        let err = workflow.analyze("t", &[]).await.unwrap_err();
        assert!(matches!(err, CollabError::LlmInvalidOutput { .. }));
    }
}
