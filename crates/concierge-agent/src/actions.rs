//! User-facing labels for internal action records.

use crate::types::Action;

/// Action types that never reach the user.
pub const HIDDEN_ACTIONS: [&str; 5] = [
    "rag_search",
    "context_loaded",
    "validation_passed",
    "cache_hit",
    "unknown",
];

fn known_label(kind: &str) -> Option<&'static str> {
    Some(match kind {
        "task_created" => "📋 Task created",
        "tasks_created_from_meeting" => "📋 Tasks created from meeting",
        "meeting_processed" => "🎯 Meeting processed",
        "knowledge_saved" => "🧠 Information saved",
        "message_scheduled" => "📨 Message scheduled",
        _ => return None,
    })
}

/// Render actions for display, dropping hidden ones.
///
/// Unknown types are title-cased: `custom_action` becomes `✅ Custom Action`.
pub fn format_actions(actions: &[Action]) -> Vec<String> {
    actions
        .iter()
        .map(|a| a.kind.as_str())
        .filter(|kind| !kind.is_empty() && !HIDDEN_ACTIONS.contains(kind))
        .map(|kind| match known_label(kind) {
            Some(label) => label.to_string(),
            None => format!("✅ {}", title_case(kind)),
        })
        .collect()
}

fn title_case(kind: &str) -> String {
    kind.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
