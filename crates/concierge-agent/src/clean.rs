//! Normalization of model-authored text before it reaches the user.
//!
//! Strips HTML tags, agent-name prefixes, report labels, progress phrases
//! and markdown syntax, then collapses runs of blank lines. The rules are
//! applied until nothing changes, which makes [`clean_response`]
//! idempotent. Every rule only deletes text, so the loop terminates.

use std::sync::OnceLock;

use regex::Regex;
use tracing::error;

/// Returned when cleaning leaves fewer than [`MIN_CHARS`] characters.
pub const PLACEHOLDER: &str = "Done.";

const MIN_CHARS: usize = 3;

/// Compiled cleaning rules, applied in order.
pub struct ResponseCleaner {
    rules: Vec<(Regex, &'static str)>,
}

impl ResponseCleaner {
    pub fn new() -> Result<Self, regex::Error> {
        let table: [(&str, &'static str); 14] = [
            // HTML tags such as <b>...</b>.
            (r"</?[a-zA-Z][^<>]*>", ""),
            (r"🤖\s*", ""),
            // Code fence lines, with or without a language tag.
            (r"(?m)^[ \t]*```[\w+-]*[ \t]*(?:\n|$)", ""),
            (r"(?m)^[ \t]{0,3}#{1,6}[ \t]+", ""),
            (r"\*\*([^*\n]+?)\*\*", "$1"),
            (r"__([^_\n]+?)__", "$1"),
            (r"\*([^*\s][^*\n]*?)\*", "$1"),
            (r"`([^`\n]+)`", "$1"),
            (r"\[([^\]\n]+)\]\([^)\s]+\)", "$1"),
            // "taskAgent:", "TestAgent:" at the start of a line. "Agent" is
            // case-sensitive so words such as "Reagent:" survive.
            (r"(?m)^[ \t]*[\p{L}\p{N}_]*Agent[ \t]*:[ \t]*", ""),
            (
                r"(?im)^[ \t]*(?:summary|резюме|контекст из базы знаний|knowledge base context)[ \t]*:[ \t]*",
                "",
            ),
            (
                r"(?i)(?:🔍[ \t]*)?(?:ищу информацию|обрабатываю|searching(?: for information)?|processing|thinking)[ \t]*(?:\.\.\.|…)[ \t]*",
                "",
            ),
            (r"(?i)✅[ \t]*(?:обработано|processed)\.?[ \t]*", ""),
            (r"\n[ \t]*\n(?:[ \t]*\n)+", "\n\n"),
        ];

        let rules = table
            .into_iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, replacement)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Clean `text`; see the module docs.
    pub fn clean(&self, text: &str) -> String {
        let mut current = text.trim().to_string();
        loop {
            let next = self.clean_once(&current);
            if next.len() >= current.len() {
                break;
            }
            current = next;
        }
        finish(current)
    }

    fn clean_once(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (re, replacement) in &self.rules {
            if re.is_match(&out) {
                out = re.replace_all(&out, *replacement).into_owned();
            }
        }
        out.trim().to_string()
    }
}

/// Clean model output with the shared rule set.
pub fn clean_response(text: &str) -> String {
    static CLEANER: OnceLock<Option<ResponseCleaner>> = OnceLock::new();
    let cleaner = CLEANER.get_or_init(|| match ResponseCleaner::new() {
        Ok(c) => Some(c),
        Err(e) => {
            error!(error = %e, "response cleaning rules failed to compile");
            None
        }
    });

    match cleaner {
        Some(c) => c.clean(text),
        None => finish(text.trim().to_string()),
    }
}

fn finish(text: String) -> String {
    if text.chars().count() < MIN_CHARS {
        PLACEHOLDER.to_string()
    } else {
        text
    }
}
