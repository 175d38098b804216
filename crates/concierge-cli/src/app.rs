//! Runtime assembly: stores, model, agents, router and scheduler.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use concierge_agent::{
    AgentResponse, AgentRunner, DefaultAgent, KnowledgeAgent, LanguageModel, LlmClient,
    LlmMeetingWorkflow, MeetingAgent, MessageAgent, RagQueryAgent, TaskAgent, format_actions,
};
use concierge_intent::{AgentRegistry, AgentRouter, Classifier, MessageScheduler};
use concierge_store::{Database, DocumentIndex, RecordStore};

use crate::bridge::{IndexBridge, RecordBridge};
use crate::config::{AppConfig, process_env};
use crate::context::FileKnowledge;
use crate::delivery::{StdoutMessenger, spawn_delivery};

/// A fully wired assistant.
pub struct App {
    router: AgentRouter,
    scheduler: Arc<MessageScheduler>,
    delivery: JoinHandle<()>,
    model: String,
}

impl App {
    /// Open storage per `config` (or in memory) and wire every agent.
    pub async fn start(config: &AppConfig, ephemeral: bool) -> Result<Self> {
        let db = open_database(config, ephemeral).await?;

        let llm_config = config.llm_client_config(process_env)?;
        let model = llm_config.default_model.clone();
        let llm: Arc<dyn LanguageModel> =
            Arc::new(LlmClient::new(llm_config).context("failed to create LLM client")?);
        info!(model = %model, "LLM client ready");

        let records = Arc::new(RecordBridge::new(RecordStore::new(db.clone())));
        let index = Arc::new(IndexBridge::new(DocumentIndex::new(db)));
        let knowledge = Arc::new(FileKnowledge::new(
            &config.context.directory,
            &config.context.transcripts_dir,
        ));
        let scheduler = Arc::new(MessageScheduler::new());

        let workflow =
            Arc::new(LlmMeetingWorkflow::new(Arc::clone(&llm)).with_knowledge(knowledge.clone()));
        let registry = AgentRegistry::new(Arc::new(DefaultAgent::new(Arc::clone(&llm))))
            .mount(Arc::new(
                TaskAgent::new(Arc::clone(&llm), records.clone()).with_knowledge(knowledge.clone()),
            ))
            .mount(Arc::new(
                MeetingAgent::new(workflow, records.clone()).with_knowledge(knowledge.clone()),
            ))
            .mount(Arc::new(MessageAgent::new(records.clone(), scheduler.clone())))
            .mount(Arc::new(KnowledgeAgent::new(index.clone())))
            .mount(Arc::new(RagQueryAgent::new(Arc::clone(&llm), index.clone())));
        info!(agents = ?registry.mounted(), "agents mounted");

        let runner =
            AgentRunner::new(index, config.agents.runner.clone()).with_knowledge(knowledge);
        let router = AgentRouter::new(
            Classifier::new(llm),
            registry,
            runner,
            config.router.clone(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        scheduler.start(tx).await?;
        let delivery = spawn_delivery(rx, Arc::new(StdoutMessenger::new()));

        Ok(Self {
            router,
            scheduler,
            delivery,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn handle(&self, input: &str, sender: Option<&str>) -> AgentResponse {
        self.router.route(input, sender).await
    }

    pub async fn pending_messages(&self) -> usize {
        self.scheduler.list().await.len()
    }

    /// Stop the scheduler and the delivery task. Pending jobs are dropped.
    pub async fn shutdown(self) {
        self.scheduler.stop().await;
        self.delivery.abort();
    }
}

pub async fn open_database(config: &AppConfig, ephemeral: bool) -> Result<Database> {
    if ephemeral {
        let db = Database::open_in_memory().context("failed to open in-memory database")?;
        db.run_migrations().await.context("failed to migrate database")?;
        info!("using ephemeral in-memory store");
        return Ok(db);
    }

    let data_dir = &config.store.data_dir;
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir).context("failed to create data directory")?;
    }
    let path = config.store.database_path();
    let db = Database::open_and_migrate(path.clone())
        .await
        .context("failed to open database")?;
    info!(path = %path.display(), "store initialized");
    Ok(db)
}

/// Human-readable rendering of a routed response and its chain.
pub fn render(response: &AgentResponse) -> String {
    let mut out = response.response.clone();
    let actions = format_actions(&response.actions);
    if !actions.is_empty() {
        out.push_str("\n\n");
        out.push_str(&actions.join("\n"));
    }

    let chain = response
        .metadata
        .get("chain_responses")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    for step in chain {
        if let Some(text) = step.get("response").and_then(|v| v.as_str()) {
            out.push_str("\n\n");
            out.push_str(text);
        }
    }
    out
}
