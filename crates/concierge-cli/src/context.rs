//! File-backed knowledge context.
//!
//! People, projects and glossary come from a TOML file shaped like
//! [`ContextDirectory`]; the latest meeting is the most recently modified
//! `.txt` or `.md` file in the transcripts directory. Both are optional:
//! a missing file or directory yields an empty context.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use concierge_agent::{
    CollabError, CollabResult, ContextDirectory, KnowledgeProvider, MeetingTranscript,
    ResolvedEntities,
};

const TRANSCRIPT_EXTENSIONS: [&str; 2] = ["txt", "md"];

pub struct FileKnowledge {
    directory_path: PathBuf,
    transcripts_dir: PathBuf,
    directory: RwLock<ContextDirectory>,
}

impl FileKnowledge {
    pub fn new(directory_path: impl Into<PathBuf>, transcripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            directory_path: directory_path.into(),
            transcripts_dir: transcripts_dir.into(),
            directory: RwLock::new(ContextDirectory::default()),
        }
    }

    /// Snapshot of the loaded directory.
    pub async fn directory(&self) -> ContextDirectory {
        self.directory.read().await.clone()
    }
}

fn context_error(path: &Path, reason: impl std::fmt::Display) -> CollabError {
    CollabError::Context {
        reason: format!("{}: {reason}", path.display()),
    }
}

#[async_trait]
impl KnowledgeProvider for FileKnowledge {
    async fn ensure_synced(&self) -> CollabResult<()> {
        let path = &self.directory_path;
        let loaded = match tokio::fs::read_to_string(path).await {
            Ok(raw) => toml::from_str::<ContextDirectory>(&raw).map_err(|e| context_error(path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no context directory file");
                ContextDirectory::default()
            }
            Err(e) => return Err(context_error(path, e)),
        };
        info!(
            people = loaded.people.len(),
            projects = loaded.projects.len(),
            glossary = loaded.glossary.len(),
            "context directory loaded"
        );
        *self.directory.write().await = loaded;
        Ok(())
    }

    async fn resolve_entities(&self, text: &str) -> CollabResult<ResolvedEntities> {
        Ok(self.directory.read().await.resolve(text))
    }

    async fn glossary_terms(&self, text: &str) -> CollabResult<Vec<(String, String)>> {
        Ok(self.directory.read().await.glossary_terms(text))
    }

    async fn latest_meeting(&self) -> CollabResult<Option<MeetingTranscript>> {
        let dir = &self.transcripts_dir;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(context_error(dir, e)),
        };

        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await.map_err(|e| context_error(dir, e))? {
            let path = entry.path();
            let is_transcript = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| TRANSCRIPT_EXTENSIONS.contains(&ext));
            if !is_transcript {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .map_err(|e| context_error(&path, e))?;
            if newest.as_ref().is_none_or(|(at, _)| modified > *at) {
                newest = Some((modified, path));
            }
        }

        let Some((modified, path)) = newest else {
            return Ok(None);
        };
        let transcript = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| context_error(&path, e))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("meeting")
            .to_string();
        debug!(path = %path.display(), "latest transcript found");
        Ok(Some(MeetingTranscript {
            id: stem.clone(),
            title: stem.replace(['_', '-'], " "),
            transcript,
            held_at: Some(DateTime::<Utc>::from(modified)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn missing_sources_give_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let knowledge = FileKnowledge::new(dir.path().join("none.toml"), dir.path().join("none"));
        knowledge.ensure_synced().await.unwrap();
        assert!(knowledge.directory().await.is_empty());
        assert!(knowledge.latest_meeting().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn loads_directory_and_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.toml");
        std::fs::write(
            &path,
            r#"
            [[people]]
            name = "Иван"
            aliases = ["Ваня"]

            [[projects]]
            key = "Alpha"

            [glossary]
            MVP = "minimum viable product"
            "#,
        )
        .unwrap();

        let knowledge = FileKnowledge::new(&path, dir.path());
        knowledge.ensure_synced().await.unwrap();
        let entities = knowledge
            .resolve_entities("Напомни Ивану про Alpha MVP")
            .await
            .unwrap();
        assert_eq!(entities.people, ["Иван"]);
        assert_eq!(entities.projects, ["Alpha"]);
        let terms = knowledge.glossary_terms("ship the MVP").await.unwrap();
        assert_eq!(terms[0].0, "MVP");
    }

    #[tokio::test]
    async fn malformed_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.toml");
        std::fs::write(&path, "people = 3").unwrap();
        let knowledge = FileKnowledge::new(&path, dir.path());
        assert!(matches!(
            knowledge.ensure_synced().await,
            Err(CollabError::Context { .. })
        ));
    }

    #[tokio::test]
    async fn latest_transcript_is_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old_sync.txt"), "old").unwrap();
        std::fs::write(dir.path().join("notes.json"), "{}").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(dir.path().join("weekly-sync.md"), "Anna: ship Friday").unwrap();

        let knowledge = FileKnowledge::new(dir.path().join("none.toml"), dir.path());
        let meeting = knowledge.latest_meeting().await.unwrap().unwrap();
        assert_eq!(meeting.id, "weekly-sync");
        assert_eq!(meeting.title, "weekly sync");
        assert_eq!(meeting.transcript, "Anna: ship Friday");
        assert!(meeting.held_at.is_some());
    }
}
