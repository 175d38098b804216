//! Routing observability.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use concierge_agent::{AgentType, IntentClassification};

/// A chain step that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedChainStep {
    pub agent_type: AgentType,
    pub error: String,
}

/// How one message was routed.
///
/// Built up over a single routing call and attached to the final response.
/// Nothing reads it back for control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub selected_agent: AgentType,
    /// What the classifier asked for, before any fallback.
    pub requested_agent: AgentType,
    pub confidence: f64,
    pub reasoning: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub processing_time_ms: u64,
    /// Agents run after the primary one, in order.
    pub agent_chain: Vec<AgentType>,
    pub classification_details: IntentClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(default)]
    pub failed_chain_steps: Vec<FailedChainStep>,
    #[serde(default)]
    pub chain_truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    started: Option<Instant>,
}

impl DecisionTrace {
    /// Open a trace for `classification`; the clock starts now.
    pub fn open(classification: &IntentClassification) -> Self {
        Self {
            selected_agent: classification.agent_type,
            requested_agent: classification.agent_type,
            confidence: classification.confidence,
            reasoning: classification.reasoning.clone(),
            start_time: Utc::now(),
            end_time: None,
            processing_time_ms: 0,
            agent_chain: Vec::new(),
            classification_details: classification.clone(),
            fallback_reason: None,
            failed_chain_steps: Vec::new(),
            chain_truncated: false,
            error: None,
            started: Some(Instant::now()),
        }
    }

    /// Route to `agent` instead of the requested one.
    pub fn fall_back(&mut self, agent: AgentType, reason: impl Into<String>) {
        self.selected_agent = agent;
        self.fallback_reason = Some(reason.into());
    }

    pub fn record_failed_step(&mut self, agent_type: AgentType, error: impl Into<String>) {
        self.failed_chain_steps.push(FailedChainStep {
            agent_type,
            error: error.into(),
        });
    }

    /// Stamp the end time. Later calls keep the first stamp.
    pub fn finish(&mut self) {
        if self.end_time.is_some() {
            return;
        }
        self.end_time = Some(Utc::now());
        self.processing_time_ms = self
            .started
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or(0);
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_is_stamped_once() {
        let mut trace = DecisionTrace::open(&IntentClassification::fallback("x"));
        assert!(!trace.is_finished());
        trace.finish();
        let first = trace.end_time;
        trace.finish();
        assert_eq!(trace.end_time, first);
        assert!(trace.end_time.unwrap() >= trace.start_time);
    }

    #[test]
    fn serializes_optional_fields_only_when_set() {
        let mut trace = DecisionTrace::open(&IntentClassification::fallback("x"));
        trace.finish();
        let json = serde_json::to_value(&trace).unwrap();
        assert!(json.get("fallback_reason").is_none());
        assert!(json.get("started").is_none());
        assert_eq!(json["selected_agent"], "default");

        trace.fall_back(AgentType::Default, "task agent not mounted");
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["fallback_reason"], "task agent not mounted");
    }
}
