//! Agent behavior through the runner, with in-memory collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc, Weekday};
use serde_json::{Value, json};

use concierge_agent::{
    AgentRunner, AgentType, Collection, CollabError, CollabResult, ContactRef, CreatedTask,
    DefaultAgent, GenerationOptions, IntentClassification, JsonMap, KnowledgeAgent,
    KnowledgeProvider, LanguageModel, MeetingAgent, MeetingAnalysis, MeetingDraft,
    MeetingTranscript, MeetingWorkflow, MessageAgent, PersistenceStore, RagQueryAgent,
    ResolvedEntities, RetrievalStore, RetrievedItem, RunnerConfig, ScheduledAction, ScheduledJob,
    Scheduler, TaskAgent, TaskDraft, format_actions,
};

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

/// Language model that either fails or returns canned values.
struct MockLlm {
    text: Option<String>,
    structured: Option<JsonMap>,
}

impl MockLlm {
    fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            structured: None,
        })
    }

    fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            structured: None,
        })
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn generate_text(&self, _: &str, _: &GenerationOptions) -> CollabResult<String> {
        self.text.clone().ok_or(CollabError::LlmUnavailable {
            reason: "offline".into(),
        })
    }

    async fn generate_structured(&self, _: &str, _: &Value, _: f32) -> CollabResult<JsonMap> {
        self.structured.clone().ok_or(CollabError::LlmUnavailable {
            reason: "offline".into(),
        })
    }
}

#[derive(Default)]
struct MemoryIndex {
    docs: Mutex<Vec<(Collection, String, String)>>,
}

impl MemoryIndex {
    fn in_collection(&self, collection: Collection) -> Vec<(String, String)> {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, _)| *c == collection)
            .map(|(_, id, content)| (id.clone(), content.clone()))
            .collect()
    }
}

#[async_trait]
impl RetrievalStore for MemoryIndex {
    async fn search_similar(
        &self,
        collection: Collection,
        query: &str,
        limit: usize,
    ) -> CollabResult<Vec<RetrievedItem>> {
        let query = query.to_lowercase();
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, content)| {
                *c == collection
                    && query
                        .split_whitespace()
                        .any(|w| w.len() > 3 && content.to_lowercase().contains(w))
            })
            .take(limit)
            .map(|(_, id, content)| RetrievedItem {
                id: id.clone(),
                content: content.clone(),
                metadata: Value::Null,
                score: 1.0,
            })
            .collect())
    }

    async fn add(&self, collection: Collection, id: &str, content: &str, _: Value) -> CollabResult<()> {
        self.docs
            .lock()
            .unwrap()
            .push((collection, id.to_string(), content.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct MemoryRecords {
    tasks: Mutex<Vec<TaskDraft>>,
    meetings: Mutex<Vec<MeetingDraft>>,
    contacts: Vec<ContactRef>,
}

#[async_trait]
impl PersistenceStore for MemoryRecords {
    async fn create_task(&self, draft: TaskDraft) -> CollabResult<CreatedTask> {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(draft.clone());
        Ok(CreatedTask {
            id: format!("task-{}", tasks.len()),
            title: draft.title,
            assignee: draft.assignee,
            priority: draft.priority,
            project: draft.project,
            deadline: draft.deadline,
        })
    }

    async fn create_meeting(&self, draft: MeetingDraft) -> CollabResult<String> {
        let mut meetings = self.meetings.lock().unwrap();
        meetings.push(draft);
        Ok(format!("meeting-{}", meetings.len()))
    }

    async fn find_contact(&self, reference: &str) -> CollabResult<Option<ContactRef>> {
        let reference = reference.trim_start_matches('@').to_lowercase();
        Ok(self
            .contacts
            .iter()
            .find(|c| c.name.to_lowercase().starts_with(&reference))
            .cloned())
    }
}

#[derive(Default)]
struct RecordingScheduler {
    jobs: Mutex<Vec<ScheduledJob>>,
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn schedule(&self, job: ScheduledJob) -> CollabResult<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

struct OneMeeting(Option<MeetingTranscript>);

#[async_trait]
impl KnowledgeProvider for OneMeeting {
    async fn ensure_synced(&self) -> CollabResult<()> {
        Ok(())
    }
    async fn resolve_entities(&self, _: &str) -> CollabResult<ResolvedEntities> {
        Ok(ResolvedEntities::default())
    }
    async fn glossary_terms(&self, _: &str) -> CollabResult<Vec<(String, String)>> {
        Ok(Vec::new())
    }
    async fn latest_meeting(&self) -> CollabResult<Option<MeetingTranscript>> {
        Ok(self.0.clone())
    }
}

struct FixedWorkflow(Value);

#[async_trait]
impl MeetingWorkflow for FixedWorkflow {
    async fn analyze(&self, _: &str, _: &[RetrievedItem]) -> CollabResult<MeetingAnalysis> {
        serde_json::from_value(self.0.clone()).map_err(|e| CollabError::LlmInvalidOutput {
            reason: e.to_string(),
        })
    }
}

fn classification(agent_type: AgentType, slots: Value) -> IntentClassification {
    let Value::Object(map) = slots else {
        panic!("slots must be an object");
    };
    IntentClassification::new(agent_type, 0.9, map, "test")
}

fn runner(index: Arc<MemoryIndex>) -> AgentRunner {
    AgentRunner::new(index, RunnerConfig::default())
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_with_friday_deadline() {
    let index = Arc::new(MemoryIndex::default());
    let records = Arc::new(MemoryRecords::default());
    let agent = TaskAgent::new(MockLlm::failing(), records.clone());

    let response = runner(index.clone())
        .process(
            &agent,
            "Нужно сделать презентацию к пятнице",
            classification(
                AgentType::Task,
                json!({"title": "Сделать презентацию", "deadline": "к пятнице"}),
            ),
            Some("42"),
        )
        .await;

    assert!(!response.is_error(), "{}", response.response);
    assert_eq!(response.actions[0].kind, "task_created");
    assert_eq!(format_actions(&response.actions), vec!["📋 Task created"]);

    let tasks = records.tasks.lock().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].source, "chat");
    let deadline = tasks[0].deadline.expect("deadline resolved");
    assert_eq!(deadline.weekday(), Weekday::Fri);
    assert!(deadline > Utc::now() - Duration::days(1));

    let indexed = index.in_collection(Collection::Tasks);
    assert_eq!(indexed, vec![("task-1".to_string(), "Нужно сделать презентацию к пятнице".to_string())]);
}

#[tokio::test]
async fn task_deadline_falls_back_to_raw_input() {
    let records = Arc::new(MemoryRecords::default());
    let agent = TaskAgent::new(MockLlm::failing(), records.clone());

    let response = runner(Arc::new(MemoryIndex::default()))
        .process(
            &agent,
            "Prepare the budget by tomorrow",
            classification(AgentType::Task, json!({})),
            None,
        )
        .await;

    assert!(!response.is_error());
    let tasks = records.tasks.lock().unwrap();
    assert_eq!(tasks[0].title, "Prepare the budget by tomorrow");
    let expected = (Utc::now() + Duration::days(1)).date_naive();
    assert_eq!(tasks[0].deadline.map(|d| d.date_naive()), Some(expected));
}

#[tokio::test]
async fn out_of_range_deadline_leaves_task_undated() {
    let records = Arc::new(MemoryRecords::default());
    let agent = TaskAgent::new(MockLlm::failing(), records.clone());

    let response = runner(Arc::new(MemoryIndex::default()))
        .process(
            &agent,
            "Сдать отчёт через 99999999999 недель",
            classification(
                AgentType::Task,
                json!({"title": "Сдать отчёт", "deadline": "через 99999999999 недель"}),
            ),
            None,
        )
        .await;

    assert!(!response.is_error(), "{}", response.response);
    let tasks = records.tasks.lock().unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].deadline.is_none());
}

#[tokio::test]
async fn task_with_project_declares_knowledge() {
    let agent = TaskAgent::new(MockLlm::failing(), Arc::new(MemoryRecords::default()));
    let response = runner(Arc::new(MemoryIndex::default()))
        .process(
            &agent,
            "Write launch notes",
            classification(AgentType::Task, json!({"project": "Apollo", "deadline": "завтра"})),
            None,
        )
        .await;

    use concierge_agent::Agent;
    assert_eq!(agent.next_agents(&response), vec![AgentType::Knowledge]);
}

#[tokio::test]
async fn chained_action_items_create_one_task_each() {
    let index = Arc::new(MemoryIndex::default());
    let records = Arc::new(MemoryRecords::default());
    let agent = TaskAgent::new(MockLlm::failing(), records.clone());

    let response = runner(index.clone())
        .process(
            &agent,
            "process the last meeting",
            classification(
                AgentType::Task,
                json!({
                    "meeting_id": "meeting-7",
                    "action_items": [
                        {"text": "Send the deck", "assignee": "Anna", "priority": "high"},
                        {"text": "Book the venue", "deadline": "завтра"}
                    ],
                    "chain_source": "meeting"
                }),
            ),
            None,
        )
        .await;

    assert_eq!(response.metadata["tasks_created"], 2);
    assert_eq!(response.metadata["meeting_id"], "meeting-7");
    assert_eq!(response.actions[0].kind, "tasks_created_from_meeting");

    let tasks = records.tasks.lock().unwrap();
    assert!(tasks.iter().all(|t| t.source == "meeting"));
    assert_eq!(tasks[0].assignee.as_deref(), Some("Anna"));
    assert!(tasks[1].deadline.is_some());
    assert_eq!(index.in_collection(Collection::Tasks).len(), 2);
}

// ---------------------------------------------------------------------------
// Meeting
// ---------------------------------------------------------------------------

fn analysis_with_items() -> Value {
    json!({
        "title": "Weekly sync",
        "summary": "**Summary:** launch moved to May",
        "participants": ["Anna"],
        "projects": ["Apollo"],
        "action_items": [
            {"text": "Update the roadmap", "assignee": "Anna"},
            {"text": "Notify partners"}
        ],
        "key_decisions": ["Launch in May"]
    })
}

#[tokio::test]
async fn latest_meeting_is_processed_and_declares_task() {
    let index = Arc::new(MemoryIndex::default());
    let records = Arc::new(MemoryRecords::default());
    let agent = MeetingAgent::new(Arc::new(FixedWorkflow(analysis_with_items())), records.clone())
        .with_knowledge(Arc::new(OneMeeting(Some(MeetingTranscript {
            id: "notes-1".into(),
            title: "Apollo weekly".into(),
            transcript: "Anna: we move the launch to May".into(),
            held_at: None,
        }))));

    let response = runner(index.clone())
        .process(
            &agent,
            "Обработай последнюю встречу",
            classification(AgentType::Meeting, json!({})),
            None,
        )
        .await;

    assert!(!response.is_error(), "{}", response.response);
    assert!(response.response.contains("Apollo weekly"));
    assert!(response.response.contains("launch moved to May"));
    assert!(!response.response.contains("**"));
    assert_eq!(response.metadata["action_items_count"], 2);
    assert_eq!(response.metadata["project"], "Apollo");

    use concierge_agent::Agent;
    assert_eq!(agent.next_agents(&response), vec![AgentType::Task]);

    let meetings = records.meetings.lock().unwrap();
    assert_eq!(meetings[0].transcript, "Anna: we move the launch to May");
    assert_eq!(
        index.in_collection(Collection::Meetings),
        vec![("meeting-1".to_string(), "Anna: we move the launch to May".to_string())]
    );
}

#[tokio::test]
async fn missing_recent_meeting_is_not_indexed() {
    let index = Arc::new(MemoryIndex::default());
    let agent = MeetingAgent::new(
        Arc::new(FixedWorkflow(analysis_with_items())),
        Arc::new(MemoryRecords::default()),
    )
    .with_knowledge(Arc::new(OneMeeting(None)));

    let response = runner(index.clone())
        .process(&agent, "process the latest meeting", classification(AgentType::Meeting, json!({})), None)
        .await;

    assert!(!response.is_error());
    assert_eq!(response.metadata["meeting_found"], false);
    assert!(index.docs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pasted_transcript_with_embedded_last_is_kept() {
    let records = Arc::new(MemoryRecords::default());
    let agent = MeetingAgent::new(Arc::new(FixedWorkflow(analysis_with_items())), records.clone())
        .with_knowledge(Arc::new(OneMeeting(Some(MeetingTranscript {
            id: "notes-1".into(),
            title: "Old sync".into(),
            transcript: "stored transcript".into(),
            held_at: None,
        }))));
    let pasted = "Anna: the elastic cluster survived the blast of traffic";

    let response = runner(Arc::new(MemoryIndex::default()))
        .process(&agent, pasted, classification(AgentType::Meeting, json!({})), None)
        .await;

    assert!(!response.is_error(), "{}", response.response);
    assert!(!response.response.contains("Old sync"));
    assert_eq!(records.meetings.lock().unwrap()[0].transcript, pasted);
}

#[tokio::test]
async fn bad_analysis_is_an_error_response() {
    let agent = MeetingAgent::new(
        Arc::new(FixedWorkflow(json!({"action_items": 5}))),
        Arc::new(MemoryRecords::default()),
    );
    let response = runner(Arc::new(MemoryIndex::default()))
        .process(&agent, "Anna: hello", classification(AgentType::Meeting, json!({})), None)
        .await;
    assert!(response.is_error());
    assert!(response.response.starts_with("error while processing: "));
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

fn message_agent(scheduler: Arc<RecordingScheduler>) -> MessageAgent {
    let records = MemoryRecords {
        contacts: vec![ContactRef {
            name: "Ivan".into(),
            destination: "1001".into(),
        }],
        ..Default::default()
    };
    MessageAgent::new(Arc::new(records), scheduler)
}

#[tokio::test]
async fn message_to_contact_is_scheduled() {
    let scheduler = Arc::new(RecordingScheduler::default());
    let agent = message_agent(scheduler.clone());
    let before = Utc::now();

    let response = runner(Arc::new(MemoryIndex::default()))
        .process(
            &agent,
            "Напомни Ивану через 2 часа про отчёт",
            classification(
                AgentType::Message,
                json!({"recipient": "Ivan", "send_time": "через 2 часа", "message": "Не забудь про отчёт"}),
            ),
            Some("42"),
        )
        .await;

    assert!(!response.is_error(), "{}", response.response);
    assert_eq!(format_actions(&response.actions), vec!["📨 Message scheduled"]);
    let jobs = scheduler.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        jobs[0].action,
        ScheduledAction::SendMessage {
            destination: "1001".into(),
            text: "Не забудь про отчёт".into(),
        }
    );
    assert!(jobs[0].execute_at >= before + Duration::hours(2));
    assert!(jobs[0].repeat_interval.is_none());
}

#[tokio::test]
async fn out_of_range_send_time_defaults_to_an_hour() {
    let scheduler = Arc::new(RecordingScheduler::default());
    let agent = message_agent(scheduler.clone());
    let before = Utc::now();

    let response = runner(Arc::new(MemoryIndex::default()))
        .process(
            &agent,
            "напомни мне через 100000000 дней",
            classification(
                AgentType::Message,
                json!({"recipient": "мне", "send_time": "через 100000000 дней", "message": "ping"}),
            ),
            Some("42"),
        )
        .await;

    assert!(!response.is_error(), "{}", response.response);
    let jobs = scheduler.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].execute_at >= before + Duration::hours(1));
    assert!(jobs[0].execute_at <= Utc::now() + Duration::hours(1));
}

#[tokio::test]
async fn unknown_recipient_falls_back_to_sender() {
    let scheduler = Arc::new(RecordingScheduler::default());
    let agent = message_agent(scheduler.clone());

    runner(Arc::new(MemoryIndex::default()))
        .process(
            &agent,
            "remind me",
            classification(AgentType::Message, json!({"recipient": "Zed"})),
            Some("42"),
        )
        .await;

    let jobs = scheduler.jobs.lock().unwrap();
    let ScheduledAction::SendMessage { destination, .. } = &jobs[0].action;
    assert_eq!(destination, "42");
}

#[tokio::test]
async fn no_recipient_and_no_sender_schedules_nothing() {
    let scheduler = Arc::new(RecordingScheduler::default());
    let agent = message_agent(scheduler.clone());

    let response = runner(Arc::new(MemoryIndex::default()))
        .process(&agent, "remind me", classification(AgentType::Message, json!({})), None)
        .await;

    assert!(!response.is_error());
    assert_eq!(response.metadata["scheduled"], false);
    assert!(scheduler.jobs.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Knowledge, rag_query, default
// ---------------------------------------------------------------------------

#[tokio::test]
async fn knowledge_is_written_exactly_once() {
    let index = Arc::new(MemoryIndex::default());
    let agent = KnowledgeAgent::new(index.clone());

    let response = runner(index.clone())
        .process(
            &agent,
            "Запомни: пароль от wifi в офисе — guest2024",
            classification(AgentType::Knowledge, json!({"category": "office", "keywords": ["wifi"]})),
            None,
        )
        .await;

    assert_eq!(format_actions(&response.actions), vec!["🧠 Information saved"]);
    let docs = index.docs.lock().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].0, Collection::Knowledge);
    assert!(docs[0].1.starts_with("knowledge-"));
}

#[tokio::test]
async fn rag_query_lists_snippets_when_synthesis_fails() {
    let index = Arc::new(MemoryIndex::default());
    index.docs.lock().unwrap().extend([
        (Collection::Meetings, "m1".to_string(), "Budget review for Apollo".to_string()),
        (Collection::Tasks, "t1".to_string(), "Apollo budget spreadsheet".to_string()),
    ]);
    let agent = RagQueryAgent::new(MockLlm::failing(), index.clone());

    let response = runner(index.clone())
        .process(&agent, "what about the apollo budget?", classification(AgentType::RagQuery, json!({})), None)
        .await;

    assert!(response.response.contains("Budget review for Apollo"));
    assert!(response.response.contains("Apollo budget spreadsheet"));
    assert_eq!(response.metadata["synthesized"], false);
    assert_eq!(response.metadata["results_count"], 2);
    assert!(format_actions(&response.actions).is_empty());
    assert_eq!(index.docs.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn rag_query_synthesizes_and_cleans() {
    let index = Arc::new(MemoryIndex::default());
    index.docs.lock().unwrap().push((
        Collection::Knowledge,
        "k1".to_string(),
        "Office wifi password is guest2024".to_string(),
    ));
    let agent = RagQueryAgent::new(MockLlm::answering("🤖 **The password is guest2024**"), index.clone());

    let response = runner(index)
        .process(&agent, "office wifi password", classification(AgentType::RagQuery, json!({})), None)
        .await;
    assert_eq!(response.response, "The password is guest2024");
    assert_eq!(response.metadata["synthesized"], true);
}

#[tokio::test]
async fn default_agent_apologizes_when_model_is_down() {
    let index = Arc::new(MemoryIndex::default());
    let agent = DefaultAgent::new(MockLlm::failing());
    let response = runner(index.clone())
        .process(&agent, "how are you?", IntentClassification::fallback("test"), None)
        .await;

    assert_eq!(response.response, concierge_agent::agents::APOLOGY);
    assert!(!response.is_error());
    assert!(index.docs.lock().unwrap().is_empty());
}
