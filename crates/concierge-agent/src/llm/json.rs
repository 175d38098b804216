//! Extracting a JSON object from model output.
//!
//! Models wrap JSON in code fences, prepend prose, or leave trailing
//! commas. [`extract_object`] tolerates all three.

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::types::JsonMap;

/// Parse the first JSON object found in `raw`.
pub fn extract_object(raw: &str) -> Result<JsonMap> {
    let cleaned = strip_fences(raw.trim());

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    let candidate = match (start, end) {
        (Some(s), Some(e)) if e > s => &cleaned[s..=e],
        _ => {
            return Err(AgentError::LlmParseFailed {
                reason: format!("no JSON object in output: {}", preview(raw)),
            });
        }
    };

    let value: Value = serde_json::from_str(candidate)
        .or_else(|_| serde_json::from_str(&strip_trailing_commas(candidate)))
        .map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON ({e}): {}", preview(raw)),
        })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(AgentError::LlmParseFailed {
            reason: format!("expected JSON object, got {}", kind(&other)),
        }),
    }
}

fn strip_fences(text: &str) -> &str {
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Remove commas that directly precede `}` or `]`, outside string literals.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn preview(raw: &str) -> String {
    raw.chars().take(120).collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        let map = extract_object(r#"{"agent_type": "task", "confidence": 0.9}"#).unwrap();
        assert_eq!(map["agent_type"], "task");
    }

    #[test]
    fn fenced_object_with_prose() {
        let raw = "```json\nSure! {\"a\": 1}\n```";
        assert_eq!(extract_object(raw).unwrap()["a"], 1);
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        let raw = r#"{"items": ["a", "b",], "note": "x, }",}"#;
        let map = extract_object(raw).unwrap();
        assert_eq!(map["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(map["note"], "x, }");
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            extract_object("no json here"),
            Err(AgentError::LlmParseFailed { .. })
        ));
        assert!(extract_object("[1, 2]").is_err());
    }
}
