//! Core data types shared by the classifier, the agents and the router.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// Loosely-typed JSON object used for slots and metadata.
pub type JsonMap = Map<String, Value>;

// ---------------------------------------------------------------------------
// AgentType
// ---------------------------------------------------------------------------

/// The closed set of intents an input can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Task,
    Meeting,
    Message,
    Knowledge,
    RagQuery,
    Default,
}

impl AgentType {
    /// Every variant, in declaration order.
    pub const ALL: [AgentType; 6] = [
        Self::Task,
        Self::Meeting,
        Self::Message,
        Self::Knowledge,
        Self::RagQuery,
        Self::Default,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Meeting => "meeting",
            Self::Message => "message",
            Self::Knowledge => "knowledge",
            Self::RagQuery => "rag_query",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = AgentError;

    /// Case-insensitive; accepts `rag` and `rag-query` for [`AgentType::RagQuery`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" => Ok(Self::Task),
            "meeting" => Ok(Self::Meeting),
            "message" => Ok(Self::Message),
            "knowledge" => Ok(Self::Knowledge),
            "rag_query" | "rag" | "rag-query" => Ok(Self::RagQuery),
            "default" => Ok(Self::Default),
            _ => Err(AgentError::UnknownAgentType { name: s.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Retrieval-store collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Meetings,
    Knowledge,
    Tasks,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Meetings, Self::Knowledge, Self::Tasks];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meetings => "meetings",
            Self::Knowledge => "knowledge",
            Self::Tasks => "tasks",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// IntentClassification
// ---------------------------------------------------------------------------

/// Result of classifying one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub agent_type: AgentType,
    /// Advisory confidence in `[0, 1]`.
    pub confidence: f64,
    /// Slots extracted alongside the intent; shape varies by intent.
    #[serde(default)]
    pub extracted_data: JsonMap,
    #[serde(default)]
    pub reasoning: String,
}

impl IntentClassification {
    /// Confidence assigned when classification could not run.
    pub const FALLBACK_CONFIDENCE: f64 = 0.5;

    /// Build a classification, clamping confidence into `[0, 1]`.
    pub fn new(
        agent_type: AgentType,
        confidence: f64,
        extracted_data: JsonMap,
        reasoning: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            Self::FALLBACK_CONFIDENCE
        };
        Self {
            agent_type,
            confidence,
            extracted_data,
            reasoning: reasoning.into(),
        }
    }

    /// The `default` classification used whenever the classifier fails.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self::new(
            AgentType::Default,
            Self::FALLBACK_CONFIDENCE,
            JsonMap::new(),
            reason,
        )
    }

    /// Classification handed to a chained agent: full confidence, slots
    /// taken from the previous agent's metadata plus a `chain_source` marker.
    pub fn chained(agent_type: AgentType, previous: &AgentResponse) -> Self {
        let mut extracted_data = previous.metadata.clone();
        extracted_data.insert(
            "chain_source".into(),
            Value::String(previous.agent_type.as_str().into()),
        );
        Self::new(
            agent_type,
            1.0,
            extracted_data,
            format!("chained from {}", previous.agent_type),
        )
    }

    /// Shorthand for a string slot.
    pub fn slot_str(&self, key: &str) -> Option<&str> {
        self.extracted_data
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// A record of a side effect an agent performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: JsonMap,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: JsonMap::new(),
        }
    }

    /// Attach a field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Agent output
// ---------------------------------------------------------------------------

/// What an agent's own processing step produces.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub response: String,
    pub actions: Vec<Action>,
    pub metadata: JsonMap,
    /// Whether the runner should index this exchange afterwards.
    pub should_save_to_index: bool,
    /// Text to index in place of the raw input.
    pub index_content: Option<String>,
}

impl AgentOutcome {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            actions: Vec::new(),
            metadata: JsonMap::new(),
            should_save_to_index: true,
            index_content: None,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_index_content(mut self, content: impl Into<String>) -> Self {
        self.index_content = Some(content.into());
        self
    }

    /// Opt out of the runner's indexing step.
    pub fn without_indexing(mut self) -> Self {
        self.should_save_to_index = false;
        self
    }
}

/// Final response for one agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_type: AgentType,
    pub response: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl AgentResponse {
    /// Whether the producing agent failed.
    pub fn is_error(&self) -> bool {
        self.metadata.contains_key("error")
    }

    pub fn error_message(&self) -> Option<&str> {
        self.metadata.get("error").and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_type_serializes_snake_case() {
        let json = serde_json::to_string(&AgentType::RagQuery).unwrap();
        assert_eq!(json, "\"rag_query\"");
        let parsed: AgentType = serde_json::from_str("\"knowledge\"").unwrap();
        assert_eq!(parsed, AgentType::Knowledge);
    }

    #[test]
    fn agent_type_from_str_is_lenient() {
        assert_eq!(" Task ".parse::<AgentType>().unwrap(), AgentType::Task);
        assert_eq!("RAG".parse::<AgentType>().unwrap(), AgentType::RagQuery);
        assert!(matches!(
            "calendar".parse::<AgentType>(),
            Err(AgentError::UnknownAgentType { .. })
        ));
        for t in AgentType::ALL {
            assert_eq!(t.as_str().parse::<AgentType>().unwrap(), t);
        }
    }

    #[test]
    fn confidence_is_clamped() {
        let high = IntentClassification::new(AgentType::Task, 3.0, JsonMap::new(), "");
        let low = IntentClassification::new(AgentType::Task, -1.0, JsonMap::new(), "");
        let nan = IntentClassification::new(AgentType::Task, f64::NAN, JsonMap::new(), "");
        assert_eq!(high.confidence, 1.0);
        assert_eq!(low.confidence, 0.0);
        assert_eq!(nan.confidence, 0.5);
    }

    #[test]
    fn chained_classification_carries_metadata() {
        let mut metadata = JsonMap::new();
        metadata.insert("project".into(), "Apollo".into());
        let previous = AgentResponse {
            agent_type: AgentType::Task,
            response: "ok".into(),
            actions: vec![],
            metadata,
        };

        let c = IntentClassification::chained(AgentType::Knowledge, &previous);
        assert_eq!(c.agent_type, AgentType::Knowledge);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.slot_str("project"), Some("Apollo"));
        assert_eq!(c.slot_str("chain_source"), Some("task"));
    }

    #[test]
    fn action_flattens_fields() {
        let action = Action::new("task_created").with("task_id", "t-1");
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json, serde_json::json!({"type": "task_created", "task_id": "t-1"}));
    }

    #[test]
    fn error_metadata_marks_response() {
        let mut response = AgentResponse {
            agent_type: AgentType::Default,
            response: "x".into(),
            actions: vec![],
            metadata: JsonMap::new(),
        };
        assert!(!response.is_error());
        response.metadata.insert("error".into(), "boom".into());
        assert_eq!(response.error_message(), Some("boom"));
    }
}
