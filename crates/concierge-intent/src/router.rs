//! Top-level message routing: classify, dispatch, chain, finalize.
//!
//! ```text
//! input ─> Classifier ─> AgentRegistry ─> AgentRunner ─> primary response
//!                                                            │ next_agents
//!                                         chain coordinator <┘
//!                                                │
//!                 response + chain_responses + decision_trace
//! ```
//!
//! A classified type with no mounted agent falls back to the default agent
//! and the reason is recorded in the trace. Chain steps run one after the
//! other; a failing step is logged, listed in the trace and skipped.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use concierge_agent::base::excerpt;
use concierge_agent::{Agent, AgentResponse, AgentRunner, AgentType, IntentClassification};

use crate::classifier::Classifier;
use crate::trace::DecisionTrace;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Longest follow-up chain run after the primary agent.
    pub max_chain_length: usize,
    /// Characters of the previous response appended to a chained input.
    pub chain_excerpt_chars: usize,
    /// Classifications below this confidence go to the default agent.
    /// Zero disables the gate.
    pub min_confidence: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_chain_length: 4,
            chain_excerpt_chars: 300,
            min_confidence: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Agents keyed by the type they handle. Always holds a default agent.
pub struct AgentRegistry {
    default: Arc<dyn Agent>,
    agents: BTreeMap<AgentType, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Start a registry around the agent used whenever nothing else fits.
    pub fn new(default_agent: Arc<dyn Agent>) -> Self {
        let mut agents = BTreeMap::new();
        agents.insert(default_agent.agent_type(), Arc::clone(&default_agent));
        Self {
            default: default_agent,
            agents,
        }
    }

    /// Mount `agent` under its own type, replacing any previous one.
    pub fn mount(mut self, agent: Arc<dyn Agent>) -> Self {
        let agent_type = agent.agent_type();
        if self.agents.insert(agent_type, agent).is_some() {
            warn!(agent = %agent_type, "replacing mounted agent");
        }
        self
    }

    pub fn get(&self, agent_type: AgentType) -> Option<&Arc<dyn Agent>> {
        self.agents.get(&agent_type)
    }

    pub fn default_agent(&self) -> &Arc<dyn Agent> {
        &self.default
    }

    /// Mounted types in declaration order.
    pub fn mounted(&self) -> Vec<AgentType> {
        self.agents.keys().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct AgentRouter {
    classifier: Classifier,
    registry: AgentRegistry,
    runner: AgentRunner,
    config: RouterConfig,
}

impl AgentRouter {
    pub fn new(
        classifier: Classifier,
        registry: AgentRegistry,
        runner: AgentRunner,
        config: RouterConfig,
    ) -> Self {
        Self {
            classifier,
            registry,
            runner,
            config,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &AgentRunner {
        &self.runner
    }

    /// Classify `input`. Never fails.
    pub async fn classify(&self, input: &str) -> IntentClassification {
        self.classifier.classify(input).await
    }

    /// Classify and route one message.
    pub async fn route(&self, input: &str, sender: Option<&str>) -> AgentResponse {
        let classification = self.classify(input).await;
        self.route_classified(input, classification, sender).await
    }

    /// Route an already classified message, run any follow-up chain and
    /// attach `chain_responses` and `decision_trace` to the result.
    #[instrument(skip(self, input, classification), fields(agent = %classification.agent_type))]
    pub async fn route_classified(
        &self,
        input: &str,
        classification: IntentClassification,
        sender: Option<&str>,
    ) -> AgentResponse {
        let mut trace = DecisionTrace::open(&classification);
        let agent = self.select(&classification, &mut trace);

        let primary = self
            .runner
            .process(agent.as_ref(), input, classification, sender)
            .await;

        let chain = if let Some(error) = primary.error_message() {
            trace.error = Some(error.to_string());
            Vec::new()
        } else {
            self.run_chain(agent.as_ref(), &primary, input, sender, &mut trace)
                .await
        };

        trace.finish();
        info!(
            agent = %trace.selected_agent,
            chain = chain.len(),
            failed_steps = trace.failed_chain_steps.len(),
            elapsed_ms = trace.processing_time_ms,
            "message routed"
        );
        finalize(primary, &chain, &trace)
    }

    /// Pick the agent for `classification`, recording any fallback.
    fn select(
        &self,
        classification: &IntentClassification,
        trace: &mut DecisionTrace,
    ) -> Arc<dyn Agent> {
        let requested = classification.agent_type;
        let default = self.registry.default_agent();

        if self.config.min_confidence > 0.0
            && classification.confidence < self.config.min_confidence
            && requested != default.agent_type()
        {
            let reason = format!(
                "confidence {:.2} below threshold {:.2}",
                classification.confidence, self.config.min_confidence
            );
            debug!(agent = %requested, %reason, "falling back to default agent");
            trace.fall_back(default.agent_type(), reason);
            return Arc::clone(default);
        }

        match self.registry.get(requested) {
            Some(agent) => Arc::clone(agent),
            None => {
                warn!(agent = %requested, "no agent mounted, falling back to default");
                trace.fall_back(
                    default.agent_type(),
                    format!("no agent mounted for {requested}"),
                );
                Arc::clone(default)
            }
        }
    }

    /// Run the follow-up agents `agent` declares for `primary`.
    async fn run_chain(
        &self,
        agent: &dyn Agent,
        primary: &AgentResponse,
        input: &str,
        sender: Option<&str>,
        trace: &mut DecisionTrace,
    ) -> Vec<AgentResponse> {
        let mut visited = HashSet::from([primary.agent_type]);
        let mut planned: Vec<AgentType> = agent
            .next_agents(primary)
            .into_iter()
            .filter(|t| visited.insert(*t))
            .collect();
        if planned.len() > self.config.max_chain_length {
            warn!(
                declared = planned.len(),
                max = self.config.max_chain_length,
                "truncating agent chain"
            );
            planned.truncate(self.config.max_chain_length);
            trace.chain_truncated = true;
        }
        trace.agent_chain = planned.clone();

        let mut responses = Vec::new();
        let mut previous = primary.clone();
        for next_type in planned {
            let Some(next) = self.registry.get(next_type) else {
                warn!(agent = %next_type, "chained agent not mounted, skipping");
                trace.record_failed_step(next_type, "agent not mounted");
                continue;
            };

            let classification = IntentClassification::chained(next_type, &previous);
            let chained_input = format!(
                "{input}\n\n{}",
                excerpt(&previous.response, self.config.chain_excerpt_chars)
            );
            debug!(from = %previous.agent_type, to = %next_type, "running chained agent");

            let response = self
                .runner
                .process(next.as_ref(), &chained_input, classification, sender)
                .await;
            if let Some(error) = response.error_message() {
                warn!(agent = %next_type, %error, "chained agent failed, skipping");
                trace.record_failed_step(next_type, error);
                continue;
            }
            previous = response.clone();
            responses.push(response);
        }
        responses
    }
}

fn finalize(mut primary: AgentResponse, chain: &[AgentResponse], trace: &DecisionTrace) -> AgentResponse {
    let chain_responses: Vec<Value> = chain
        .iter()
        .map(|r| {
            json!({
                "agent_type": r.agent_type,
                "response": r.response,
                "actions": r.actions,
            })
        })
        .collect();
    primary
        .metadata
        .insert("chain_responses".into(), Value::Array(chain_responses));

    match serde_json::to_value(trace) {
        Ok(value) => {
            primary.metadata.insert("decision_trace".into(), value);
        }
        Err(e) => warn!(error = %e, "decision trace could not be serialized"),
    }
    primary
}
