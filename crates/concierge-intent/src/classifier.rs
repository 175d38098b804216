//! Intent classification through the language model.
//!
//! [`Classifier::classify`] never fails. Empty input, an unreachable model,
//! malformed output and unknown agent types all yield the `default` intent
//! with confidence 0.5.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use concierge_agent::{AgentType, IntentClassification, JsonMap, LanguageModel};

use crate::error::{IntentError, Result};

/// Low temperature keeps classification close to deterministic.
pub const CLASSIFICATION_TEMPERATURE: f32 = 0.3;

const PROMPT: &str = r#"Classify the user's message and decide which agent should handle it.

Agent types:
- task: a task with a deadline, a reminder, a todo ("нужно сделать", "не забудь", "need to", "todo")
- meeting: a meeting report or summary ("обработай встречу", "сделай репорт", "process the meeting")
- message: a deferred message to send ("напомни отправить", "сообщение для X", "send X a message at")
- knowledge: save information to the knowledge base ("запомни", "сохрани это", "remember that")
- rag_query: a question or search over stored information ("найди", "когда было", "что такое", "what did we decide")
- default: small talk, help, or an unclear intent

Return a JSON object with:
- agent_type: one of the types above
- confidence: a number from 0.0 to 1.0
- extracted_data: an object with the extracted slots (title, deadline, assignee, priority, project, recipient, send_time, message, category, keywords)
- reasoning: a short explanation of the choice

Examples:
- "Нужно сделать презентацию к пятнице" -> task (deadline: пятница)
- "Обработай последнюю встречу" -> meeting
- "Напомни отправить отчет Ивану завтра" -> message (recipient: Иван, send_time: завтра)
- "Запомни что проект Альфа запускается в марте" -> knowledge
- "Когда была последняя встреча по проекту Бета?" -> rag_query
- "Привет, как дела?" -> default

Message: "#;

/// Maps free text onto one of the six agent types.
pub struct Classifier {
    llm: Arc<dyn LanguageModel>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Classify `input`, falling back to `default` on any failure.
    pub async fn classify(&self, input: &str) -> IntentClassification {
        if input.trim().is_empty() {
            debug!("empty input, skipping the model");
            return IntentClassification::fallback("classification failed: empty input");
        }

        match self.try_classify(input).await {
            Ok(classification) => {
                info!(
                    agent = %classification.agent_type,
                    confidence = classification.confidence,
                    "message classified"
                );
                classification
            }
            Err(e) => {
                warn!(error = %e, "classification failed, using default agent");
                IntentClassification::fallback(format!("classification failed: {e}"))
            }
        }
    }

    async fn try_classify(&self, input: &str) -> Result<IntentClassification> {
        let prompt = format!("{PROMPT}\"{input}\"");
        let raw = self
            .llm
            .generate_structured(&prompt, &schema(), CLASSIFICATION_TEMPERATURE)
            .await
            .map_err(|e| IntentError::ClassificationFailed {
                reason: e.to_string(),
            })?;
        parse_classification(&raw)
    }
}

fn schema() -> Value {
    let types: Vec<&str> = AgentType::ALL.iter().map(|t| t.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "agent_type": {"type": "string", "enum": types},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "extracted_data": {"type": "object"},
            "reasoning": {"type": "string"}
        },
        "required": ["agent_type", "confidence"]
    })
}

/// Decode a model reply into a classification.
///
/// The agent type must be known. Confidence may be a number or a numeric
/// string and is clamped; anything else becomes 0.5. A non-object
/// `extracted_data` becomes empty.
pub fn parse_classification(raw: &JsonMap) -> Result<IntentClassification> {
    let agent_type: AgentType = raw
        .get("agent_type")
        .and_then(Value::as_str)
        .ok_or_else(|| IntentError::ClassificationFailed {
            reason: "reply has no agent_type".into(),
        })?
        .parse()?;

    let confidence = match raw.get("confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .unwrap_or(IntentClassification::FALLBACK_CONFIDENCE);

    let extracted_data = match raw.get("extracted_data") {
        Some(Value::Object(map)) => map.clone(),
        _ => JsonMap::new(),
    };
    let reasoning = raw
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(IntentClassification::new(
        agent_type,
        confidence,
        extracted_data,
        reasoning,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(v: Value) -> JsonMap {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn parses_well_formed_reply() {
        let c = parse_classification(&map(json!({
            "agent_type": "task",
            "confidence": 0.92,
            "extracted_data": {"deadline": "пятница"},
            "reasoning": "deadline mentioned"
        })))
        .unwrap();
        assert_eq!(c.agent_type, AgentType::Task);
        assert_eq!(c.confidence, 0.92);
        assert_eq!(c.slot_str("deadline"), Some("пятница"));
    }

    #[test]
    fn repairs_sloppy_fields() {
        let c = parse_classification(&map(json!({
            "agent_type": "RAG_QUERY",
            "confidence": "1.7",
            "extracted_data": "nothing",
        })))
        .unwrap();
        assert_eq!(c.agent_type, AgentType::RagQuery);
        assert_eq!(c.confidence, 1.0);
        assert!(c.extracted_data.is_empty());

        let c = parse_classification(&map(json!({"agent_type": "default", "confidence": null}))).unwrap();
        assert_eq!(c.confidence, 0.5);
    }

    #[test]
    fn unknown_or_missing_type_is_an_error() {
        assert!(parse_classification(&map(json!({"agent_type": "calendar"}))).is_err());
        assert!(parse_classification(&map(json!({"confidence": 1}))).is_err());
    }

    #[test]
    fn schema_lists_every_type() {
        let schema = schema();
        let types = schema["properties"]["agent_type"]["enum"].as_array().unwrap();
        assert_eq!(types.len(), AgentType::ALL.len());
    }
}
