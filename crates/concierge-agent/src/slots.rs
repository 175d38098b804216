//! Typed views over the loosely-typed `extracted_data` slot map.
//!
//! Slots come from a language model or from a previous agent's metadata,
//! so every decoder tolerates missing keys, wrong types, blank strings and
//! numbers where strings were expected.

use serde_json::Value;

use crate::collab::{ActionItem, TaskPriority};
use crate::types::JsonMap;

/// Non-blank string slot. Numbers are rendered as strings.
pub fn str_slot(map: &JsonMap, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && !is_null_word(s)).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-blank string among `keys`.
fn first_str(map: &JsonMap, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| str_slot(map, k))
}

/// Models sometimes spell out "no value" instead of omitting the key.
fn is_null_word(s: &str) -> bool {
    matches!(
        s.to_lowercase().as_str(),
        "null" | "none" | "n/a" | "не указано" | "нет"
    )
}

/// A list slot given as an array of strings or a comma-separated string.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSlots {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Free-text deadline, resolved later by the date parser.
    pub deadline: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<TaskPriority>,
    pub project: Option<String>,
    /// Present when chained from a processed meeting.
    pub action_items: Vec<ActionItem>,
}

impl TaskSlots {
    pub fn from_map(map: &JsonMap) -> Self {
        Self {
            title: first_str(map, &["title", "task", "intent"]),
            description: str_slot(map, "description"),
            deadline: first_str(map, &["deadline", "due", "due_date"]),
            assignee: first_str(map, &["assignee", "responsible"]),
            priority: str_slot(map, "priority").and_then(|p| TaskPriority::parse(&p)),
            project: str_slot(map, "project"),
            action_items: action_items(map.get("action_items")),
        }
    }

    /// Fill gaps from a secondary extraction without overriding known slots.
    pub fn merge_missing(&mut self, other: TaskSlots) {
        self.title = self.title.take().or(other.title);
        self.description = self.description.take().or(other.description);
        self.deadline = self.deadline.take().or(other.deadline);
        self.assignee = self.assignee.take().or(other.assignee);
        self.priority = self.priority.or(other.priority);
        self.project = self.project.take().or(other.project);
    }
}

/// Items given as objects (`{"text": .., "assignee": ..}`) or plain strings.
fn action_items(value: Option<&Value>) -> Vec<ActionItem> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) if !text.trim().is_empty() => Some(ActionItem {
                text: text.trim().to_string(),
                assignee: None,
                priority: TaskPriority::default(),
                deadline: None,
            }),
            Value::Object(obj) => {
                let text = first_str(obj, &["text", "task", "title", "description"])?;
                Some(ActionItem {
                    text,
                    assignee: first_str(obj, &["assignee", "responsible"]),
                    priority: str_slot(obj, "priority")
                        .and_then(|p| TaskPriority::parse(&p))
                        .unwrap_or_default(),
                    deadline: str_slot(obj, "deadline"),
                })
            }
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageSlots {
    pub recipient: Option<String>,
    pub send_time: Option<String>,
    pub text: Option<String>,
}

impl MessageSlots {
    pub fn from_map(map: &JsonMap) -> Self {
        Self {
            recipient: first_str(map, &["recipient", "to", "contact"]),
            send_time: first_str(map, &["send_time", "time", "when"]),
            text: first_str(map, &["text", "message", "content"]),
        }
    }
}

// ---------------------------------------------------------------------------
// Knowledge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeSlots {
    pub category: String,
    pub keywords: Vec<String>,
    pub project: Option<String>,
}

impl KnowledgeSlots {
    pub fn from_map(map: &JsonMap) -> Self {
        let project = str_slot(map, "project");
        let category = str_slot(map, "category").unwrap_or_else(|| {
            if project.is_some() { "project" } else { "general" }.to_string()
        });
        let mut keywords = string_list(map.get("keywords"));
        if let Some(p) = &project
            && !keywords.iter().any(|k| k.eq_ignore_ascii_case(p))
        {
            keywords.push(p.clone());
        }
        Self {
            category,
            keywords,
            project,
        }
    }
}

// ---------------------------------------------------------------------------
// Meeting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingSlots {
    pub transcript: Option<String>,
    pub meeting_id: Option<String>,
}

impl MeetingSlots {
    pub fn from_map(map: &JsonMap) -> Self {
        Self {
            transcript: first_str(map, &["transcript", "text"]),
            meeting_id: str_slot(map, "meeting_id"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> JsonMap {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn task_slots_decode_defensively() {
        let slots = TaskSlots::from_map(&map(json!({
            "title": "  Presentation ",
            "deadline": "пятница",
            "assignee": "",
            "priority": "HIGH",
            "project": null,
        })));
        assert_eq!(slots.title.as_deref(), Some("Presentation"));
        assert_eq!(slots.deadline.as_deref(), Some("пятница"));
        assert!(slots.assignee.is_none());
        assert_eq!(slots.priority, Some(TaskPriority::High));
        assert!(slots.project.is_none());
        assert!(slots.action_items.is_empty());
    }

    #[test]
    fn task_slots_ignore_wrong_types() {
        let slots = TaskSlots::from_map(&map(json!({
            "title": ["a"],
            "deadline": "не указано",
            "priority": 3,
            "action_items": "not a list",
        })));
        assert!(slots.title.is_none());
        assert!(slots.deadline.is_none());
        assert!(slots.priority.is_none());
        assert!(slots.action_items.is_empty());
    }

    #[test]
    fn action_items_accept_objects_and_strings() {
        let slots = TaskSlots::from_map(&map(json!({
            "action_items": [
                {"text": "Prepare budget", "assignee": "Anna", "priority": "low"},
                "Book the room",
                {"assignee": "nobody"},
                42,
            ]
        })));
        assert_eq!(slots.action_items.len(), 2);
        assert_eq!(slots.action_items[0].assignee.as_deref(), Some("Anna"));
        assert_eq!(slots.action_items[0].priority, TaskPriority::Low);
        assert_eq!(slots.action_items[1].text, "Book the room");
    }

    #[test]
    fn merge_keeps_existing_values() {
        let mut slots = TaskSlots {
            title: Some("Known".into()),
            ..Default::default()
        };
        slots.merge_missing(TaskSlots {
            title: Some("Other".into()),
            deadline: Some("tomorrow".into()),
            ..Default::default()
        });
        assert_eq!(slots.title.as_deref(), Some("Known"));
        assert_eq!(slots.deadline.as_deref(), Some("tomorrow"));
    }

    #[test]
    fn message_slots_accept_aliases() {
        let slots = MessageSlots::from_map(&map(json!({
            "to": "@ivan",
            "time": "через 2 часа",
            "message": "созвон",
        })));
        assert_eq!(slots.recipient.as_deref(), Some("@ivan"));
        assert_eq!(slots.send_time.as_deref(), Some("через 2 часа"));
        assert_eq!(slots.text.as_deref(), Some("созвон"));

        let numeric = MessageSlots::from_map(&map(json!({"recipient": 123456})));
        assert_eq!(numeric.recipient.as_deref(), Some("123456"));
    }

    #[test]
    fn knowledge_slots_defaults() {
        let empty = KnowledgeSlots::from_map(&JsonMap::new());
        assert_eq!(empty.category, "general");
        assert!(empty.keywords.is_empty());

        let with_project = KnowledgeSlots::from_map(&map(json!({
            "project": "Apollo",
            "keywords": "launch, budget",
        })));
        assert_eq!(with_project.category, "project");
        assert_eq!(with_project.keywords, vec!["launch", "budget", "Apollo"]);
    }
}
