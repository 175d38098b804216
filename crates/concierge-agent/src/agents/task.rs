//! Task creation, from direct requests or from meeting action items.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::display_time;
use crate::base::{Agent, AgentRequest, IndexRecord, excerpt};
use crate::collab::{KnowledgeProvider, LanguageModel, PersistenceStore, TaskDraft};
use crate::dates::{find_deadline, parse_when};
use crate::error::{AgentError, Result};
use crate::slots::TaskSlots;
use crate::types::{Action, AgentOutcome, AgentResponse, AgentType, Collection};

const EXTRACTION_TEMPERATURE: f32 = 0.2;
const TITLE_CHARS: usize = 120;

pub struct TaskAgent {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn PersistenceStore>,
    knowledge: Option<Arc<dyn KnowledgeProvider>>,
}

impl TaskAgent {
    pub fn new(llm: Arc<dyn LanguageModel>, store: Arc<dyn PersistenceStore>) -> Self {
        Self {
            llm,
            store,
            knowledge: None,
        }
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeProvider>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    fn extraction_schema() -> Value {
        let nullable = json!({"type": ["string", "null"]});
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "description": nullable,
                "deadline": nullable,
                "assignee": nullable,
                "priority": {"type": "string", "enum": ["high", "medium", "low"]},
                "project": nullable
            },
            "required": ["title"]
        })
    }

    /// Second extraction pass for requests the classifier left incomplete.
    async fn extract(&self, request: &AgentRequest) -> Option<TaskSlots> {
        let mut prompt = format!(
            "Extract a task from the message below. Today is {}. Keep the deadline \
             exactly as written (for example \"friday\" or \"через 2 дня\"), or null.\n",
            Utc::now().format("%Y-%m-%d, %A"),
        );

        if let Some(knowledge) = &self.knowledge {
            match knowledge.resolve_entities(&request.input).await {
                Ok(entities) => {
                    if !entities.people.is_empty() {
                        let _ = writeln!(prompt, "Known people mentioned: {}", entities.people.join(", "));
                    }
                    if !entities.projects.is_empty() {
                        let _ = writeln!(prompt, "Known projects mentioned: {}", entities.projects.join(", "));
                    }
                }
                Err(e) => warn!(error = %e, "entity resolution failed"),
            }
        }

        let similar = request.context_snippets(2, 100);
        if !similar.is_empty() {
            prompt.push_str("Similar tasks from history:\n");
            for s in &similar {
                let _ = writeln!(prompt, "- {s}");
            }
        }
        let _ = write!(prompt, "\nMessage: {}", request.input);

        match self
            .llm
            .generate_structured(&prompt, &Self::extraction_schema(), EXTRACTION_TEMPERATURE)
            .await
        {
            Ok(map) => Some(TaskSlots::from_map(&map)),
            Err(e) => {
                warn!(error = %e, "task extraction failed, using classifier slots only");
                None
            }
        }
    }

    async fn create_single(&self, request: &AgentRequest, mut slots: TaskSlots) -> Result<AgentOutcome> {
        if slots.deadline.is_none()
            && let Some(extra) = self.extract(request).await
        {
            slots.merge_missing(extra);
        }

        let now = Utc::now();
        let deadline = slots
            .deadline
            .as_deref()
            .and_then(|d| parse_when(d, now))
            .or_else(|| find_deadline(&request.input, now));
        let title = slots
            .title
            .clone()
            .unwrap_or_else(|| title_from(&request.input));
        if title.is_empty() {
            return Err(AgentError::InvalidInput {
                reason: "task has no title".into(),
            });
        }

        let created = self
            .store
            .create_task(TaskDraft {
                title,
                description: slots.description.clone(),
                assignee: slots.assignee.clone(),
                priority: slots.priority.unwrap_or_default(),
                project: slots.project.clone(),
                deadline,
                source: "chat".into(),
            })
            .await?;
        info!(task_id = %created.id, deadline = ?created.deadline, "task created");

        let mut text = format!("📋 Task created: {}", created.title);
        match created.deadline {
            Some(d) => {
                let _ = write!(text, "\nDeadline: {}", display_time(d));
            }
            None => text.push_str("\nDeadline: not set"),
        }
        if let Some(a) = &created.assignee {
            let _ = write!(text, "\nAssignee: {a}");
        }
        let _ = write!(text, "\nPriority: {}", created.priority.as_str());
        if let Some(p) = &created.project {
            let _ = write!(text, "\nProject: {p}");
        }

        let deadline_value = created.deadline.map(|d| d.to_rfc3339());
        Ok(AgentOutcome::new(text)
            .with_action(
                Action::new("task_created")
                    .with("task_id", created.id.as_str())
                    .with("deadline", deadline_value.clone())
                    .with("priority", created.priority.as_str()),
            )
            .with_metadata("task_id", created.id.as_str())
            .with_metadata("title", created.title.as_str())
            .with_metadata("deadline", deadline_value)
            .with_metadata("priority", created.priority.as_str())
            .with_metadata("assignee", created.assignee.clone())
            .with_metadata("project", created.project.clone()))
    }

    /// One task per action item handed over by the meeting agent.
    async fn create_from_items(&self, request: &AgentRequest, slots: TaskSlots) -> Result<AgentOutcome> {
        let now = Utc::now();
        let mut created = Vec::new();
        let mut last_error = None;

        for item in &slots.action_items {
            let draft = TaskDraft {
                title: item.text.clone(),
                description: None,
                assignee: item.assignee.clone(),
                priority: item.priority,
                project: slots.project.clone(),
                deadline: item.deadline.as_deref().and_then(|d| parse_when(d, now)),
                source: "meeting".into(),
            };
            match self.store.create_task(draft).await {
                Ok(task) => created.push(task),
                Err(e) => {
                    warn!(item = %item.text, error = %e, "could not create task from action item");
                    last_error = Some(e);
                }
            }
        }

        if created.is_empty()
            && let Some(e) = last_error
        {
            return Err(e.into());
        }
        info!(count = created.len(), "tasks created from meeting");

        let mut text = format!("📋 Created {} task(s) from the meeting:", created.len());
        for task in &created {
            match &task.assignee {
                Some(a) => {
                    let _ = write!(text, "\n- {} ({a})", task.title);
                }
                None => {
                    let _ = write!(text, "\n- {}", task.title);
                }
            }
        }

        let ids: Vec<&str> = created.iter().map(|t| t.id.as_str()).collect();
        let tasks: Vec<Value> = created
            .iter()
            .map(|t| json!({"id": t.id, "title": t.title, "assignee": t.assignee}))
            .collect();
        let mut outcome = AgentOutcome::new(text)
            .with_action(
                Action::new("tasks_created_from_meeting")
                    .with("count", created.len())
                    .with("task_ids", ids),
            )
            .with_metadata("tasks_created", created.len())
            .with_metadata("tasks", tasks);
        if let Some(meeting_id) = request.classification.slot_str("meeting_id") {
            outcome = outcome.with_metadata("meeting_id", meeting_id);
        }
        Ok(outcome)
    }
}

#[async_trait]
impl Agent for TaskAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Task
    }

    fn context_collections(&self) -> &'static [Collection] {
        &[Collection::Tasks, Collection::Meetings]
    }

    async fn process_with_context(&self, request: &AgentRequest) -> Result<AgentOutcome> {
        let slots = TaskSlots::from_map(&request.classification.extracted_data);
        if slots.action_items.is_empty() {
            self.create_single(request, slots).await
        } else {
            debug!(items = slots.action_items.len(), "creating tasks from action items");
            self.create_from_items(request, slots).await
        }
    }

    /// Created tasks go to the tasks collection, keyed by task id.
    fn index_records(&self, request: &AgentRequest, outcome: &AgentOutcome) -> Vec<IndexRecord> {
        if let Some(id) = outcome.metadata.get("task_id").and_then(Value::as_str) {
            return vec![IndexRecord {
                collection: Collection::Tasks,
                id: id.to_string(),
                content: request.input.clone(),
                metadata: Value::Object(outcome.metadata.clone()),
            }];
        }
        outcome
            .metadata
            .get("tasks")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|task| {
                Some(IndexRecord {
                    collection: Collection::Tasks,
                    id: task.get("id")?.as_str()?.to_string(),
                    content: task.get("title")?.as_str()?.to_string(),
                    metadata: json!({"source": "meeting", "assignee": task.get("assignee")}),
                })
            })
            .collect()
    }

    fn next_agents(&self, response: &AgentResponse) -> Vec<AgentType> {
        let has_project = response
            .metadata
            .get("project")
            .and_then(Value::as_str)
            .is_some_and(|p| !p.trim().is_empty());
        if has_project {
            vec![AgentType::Knowledge]
        } else {
            Vec::new()
        }
    }
}

/// First line of the input, shortened.
fn title_from(input: &str) -> String {
    let first_line = input.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    excerpt(first_line, TITLE_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_uses_first_non_blank_line() {
        assert_eq!(title_from("\n  Write report\nmore"), "Write report");
        assert_eq!(title_from(""), "");
    }
}
