//! Searchable document index.
//!
//! Documents live in one of three collections (`meetings`, `knowledge`,
//! `tasks`) and are keyed by `(collection, id)`; adding an existing key
//! replaces it. Search ranks by term overlap between the query and the
//! stored text. Terms are compared on a short prefix so inflected forms
//! ("встреча" / "встречи", "meeting" / "meetings") still match.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Collections the index accepts.
pub const COLLECTIONS: [&str; 3] = ["meetings", "knowledge", "tasks"];

/// Number of leading characters compared when matching terms.
const STEM_CHARS: usize = 5;

/// Upper bound on rows scored per search.
const SCAN_LIMIT: u32 = 2_000;

/// A document returned from [`DocumentIndex::search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Fraction of query terms found in the document, in `(0, 1]`.
    pub score: f64,
}

/// Term-overlap index over the `documents` table.
#[derive(Clone)]
pub struct DocumentIndex {
    db: Database,
}

impl DocumentIndex {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or replace a document.
    #[instrument(skip(self, content, metadata))]
    pub async fn add(
        &self,
        collection: &str,
        id: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> StoreResult<()> {
        check_collection(collection)?;
        if id.is_empty() {
            return Err(StoreError::EmptyDocumentId);
        }

        let collection = collection.to_string();
        let id = id.to_string();
        let content = content.to_string();
        let terms = stems(&content).into_iter().collect::<Vec<_>>().join(" ");
        let metadata = serde_json::to_string(&metadata)?;
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO documents (collection, id, content, metadata, terms, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) \
                     ON CONFLICT(collection, id) DO UPDATE SET \
                       content = excluded.content, metadata = excluded.metadata, \
                       terms = excluded.terms, updated_at = excluded.updated_at",
                    rusqlite::params![collection, id, content, metadata, terms, now],
                )?;
                Ok(())
            })
            .await
    }

    /// Top `limit` documents in `collection` sharing terms with `query`.
    ///
    /// Documents with no overlapping term are never returned. Ties are
    /// broken by recency.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<ScoredDocument>> {
        check_collection(collection)?;
        let query_terms = stems(query);
        if query_terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let collection = collection.to_string();
        let rows = self
            .db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, content, metadata, terms FROM documents \
                     WHERE collection = ?1 ORDER BY updated_at DESC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![collection, SCAN_LIMIT], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let total = query_terms.len() as f64;
        let mut hits = Vec::new();
        for (id, content, metadata, terms) in rows {
            let doc_terms: HashSet<&str> = terms.split(' ').collect();
            let matched = query_terms
                .iter()
                .filter(|t| doc_terms.contains(t.as_str()))
                .count();
            if matched == 0 {
                continue;
            }
            hits.push(ScoredDocument {
                id,
                content,
                metadata: serde_json::from_str(&metadata)?,
                score: matched as f64 / total,
            });
        }

        // Stable sort keeps the recency order among equal scores.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        debug!(hits = hits.len(), "document search finished");
        Ok(hits)
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> StoreResult<u64> {
        check_collection(collection)?;
        let collection = collection.to_string();
        self.db
            .execute(move |conn| {
                let n: i64 = conn.query_row(
                    "SELECT count(*) FROM documents WHERE collection = ?1",
                    [&collection],
                    |row| row.get(0),
                )?;
                Ok(n.max(0) as u64)
            })
            .await
    }
}

fn check_collection(collection: &str) -> StoreResult<()> {
    if COLLECTIONS.contains(&collection) {
        Ok(())
    } else {
        Err(StoreError::UnknownCollection(collection.to_string()))
    }
}

/// Lowercased, prefix-truncated word stems of `text`, ignoring words under three letters.
fn stems(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_lowercase().chars().take(STEM_CHARS).collect())
        .collect()
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn index() -> DocumentIndex {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        DocumentIndex::new(db)
    }

    #[test]
    fn stems_fold_case_and_inflection() {
        let a = stems("Встреча по бюджету");
        let b = stems("встречи, БЮДЖЕТ!");
        assert!(a.contains("встре"));
        assert!(b.contains("встре"));
        assert!(a.contains("бюдже") && b.contains("бюдже"));
        assert!(!a.contains("по"));
    }

    #[tokio::test]
    async fn search_ranks_by_overlap() {
        let index = index().await;
        index
            .add("knowledge", "a", "Server password rotates monthly", serde_json::json!({}))
            .await
            .unwrap();
        index
            .add("knowledge", "b", "Monthly budget review", serde_json::json!({"k": 1}))
            .await
            .unwrap();
        index
            .add("knowledge", "c", "Unrelated note", serde_json::json!({}))
            .await
            .unwrap();

        let hits = index.search("knowledge", "monthly budget", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "b");
        assert_eq!(hits[0].metadata["k"], 1);
        assert!((hits[0].score - 1.0).abs() < f64::EPSILON);
        assert!(hits[1].score < 1.0);
    }

    #[tokio::test]
    async fn add_replaces_existing_id() {
        let index = index().await;
        index.add("tasks", "t1", "first text", serde_json::json!({})).await.unwrap();
        index.add("tasks", "t1", "second text", serde_json::json!({})).await.unwrap();

        assert_eq!(index.count("tasks").await.unwrap(), 1);
        let hits = index.search("tasks", "second", 3).await.unwrap();
        assert_eq!(hits[0].content, "second text");
    }

    #[tokio::test]
    async fn collections_are_isolated_and_validated() {
        let index = index().await;
        index.add("meetings", "m", "sprint planning", serde_json::json!({})).await.unwrap();

        assert!(index.search("tasks", "sprint", 3).await.unwrap().is_empty());
        assert!(matches!(
            index.search("notes", "sprint", 3).await,
            Err(StoreError::UnknownCollection(_))
        ));
        assert!(matches!(
            index.add("meetings", "", "body", serde_json::json!({})).await,
            Err(StoreError::EmptyDocumentId)
        ));
        assert!(index.search("meetings", "!!", 3).await.unwrap().is_empty());
    }
}
