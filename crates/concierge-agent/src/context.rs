//! Relational context: people, projects and a glossary.
//!
//! [`ContextDirectory`] is plain data, usually deserialized from a TOML
//! file, with entity resolution over it. [`ContextSync`] tracks whether the
//! knowledge provider has been synced during this process lifetime.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::collab::{KnowledgeProvider, ResolvedEntities};

/// Minimum shared prefix for an inflected word to match a name.
const MIN_PREFIX: usize = 3;

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// People, projects and glossary known to the assistant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextDirectory {
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub glossary: BTreeMap<String, String>,
}

impl ContextDirectory {
    /// People and projects mentioned in `text`.
    ///
    /// A name matches on exact (case-insensitive) words or on inflected
    /// forms sharing a long enough prefix, so "Ивану" finds "Иван".
    pub fn resolve(&self, text: &str) -> ResolvedEntities {
        let words = tokenize(text);
        let mut resolved = ResolvedEntities::default();

        for person in &self.people {
            let names = std::iter::once(person.name.as_str())
                .chain(person.username.as_deref())
                .chain(person.aliases.iter().map(String::as_str));
            if names.into_iter().any(|n| mentions(&words, n)) {
                resolved.people.push(person.name.clone());
            }
        }
        for project in &self.projects {
            let names = std::iter::once(project.key.as_str())
                .chain(project.keywords.iter().map(String::as_str));
            if names.into_iter().any(|n| mentions(&words, n)) {
                resolved.projects.push(project.key.clone());
            }
        }

        debug!(
            people = resolved.people.len(),
            projects = resolved.projects.len(),
            "entities resolved"
        );
        resolved
    }

    /// Glossary entries whose term occurs in `text`.
    pub fn glossary_terms(&self, text: &str) -> Vec<(String, String)> {
        let words = tokenize(text);
        self.glossary
            .iter()
            .filter(|(term, _)| mentions(&words, term))
            .map(|(t, d)| (t.clone(), d.clone()))
            .collect()
    }

    /// Prompt block describing the known people and projects.
    pub fn render_prompt(&self, entities: &ResolvedEntities) -> String {
        let mut out = String::new();
        if !self.people.is_empty() {
            out.push_str("Known people:\n");
            for p in &self.people {
                let marker = if entities.people.contains(&p.name) { " (mentioned)" } else { "" };
                let _ = match &p.role {
                    Some(role) => writeln!(out, "- {} ({role}){marker}", p.name),
                    None => writeln!(out, "- {}{marker}", p.name),
                };
            }
        }
        if !self.projects.is_empty() {
            out.push_str("Known projects:\n");
            for p in &self.projects {
                let marker = if entities.projects.contains(&p.key) { " (mentioned)" } else { "" };
                let _ = match &p.description {
                    Some(desc) => writeln!(out, "- {}: {desc}{marker}", p.key),
                    None => writeln!(out, "- {}{marker}", p.key),
                };
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty() && self.projects.is_empty() && self.glossary.is_empty()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether the word sequence `words` contains every word of `name`, in order.
fn mentions(words: &[String], name: &str) -> bool {
    let name_words = tokenize(name);
    if name_words.is_empty() || name_words.len() > words.len() {
        return false;
    }
    words
        .windows(name_words.len())
        .any(|window| window.iter().zip(&name_words).all(|(w, n)| word_matches(w, n)))
}

fn word_matches(word: &str, name: &str) -> bool {
    if word == name {
        return true;
    }
    let (wlen, nlen) = (word.chars().count(), name.chars().count());
    if nlen < MIN_PREFIX || wlen < MIN_PREFIX || wlen > nlen + 3 {
        return false;
    }
    let shared = word
        .chars()
        .zip(name.chars())
        .take_while(|(a, b)| a == b)
        .count();
    shared >= MIN_PREFIX.max(nlen - 1) && wlen - shared <= 2
}

// ---------------------------------------------------------------------------
// Sync state
// ---------------------------------------------------------------------------

/// One successful knowledge sync per process lifetime.
///
/// A failed sync leaves the cell empty, so the next request tries again.
#[derive(Debug, Default)]
pub struct ContextSync {
    cell: OnceCell<()>,
}

impl ContextSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sync through `provider` unless a previous sync succeeded.
    /// Returns whether the context is synced afterwards.
    pub async fn ensure(&self, provider: &dyn KnowledgeProvider) -> bool {
        match self.cell.get_or_try_init(|| provider.ensure_synced()).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "context sync failed, continuing with stale context");
                false
            }
        }
    }

    pub fn is_synced(&self) -> bool {
        self.cell.initialized()
    }
}
