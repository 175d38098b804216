//! Versioned schema migrations.
//!
//! Each migration is a static SQL batch keyed by a strictly increasing
//! version. Applied versions are recorded in `_migrations`, so running the
//! set twice is a no-op.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Append only.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "records: tasks, meetings, contacts",
        sql: r#"
            CREATE TABLE tasks (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                description TEXT,
                assignee    TEXT,
                priority    TEXT NOT NULL DEFAULT 'medium' CHECK(priority IN ('high','medium','low')),
                project     TEXT,
                deadline    INTEGER,
                status      TEXT NOT NULL DEFAULT 'open' CHECK(status IN ('open','done','cancelled')),
                source      TEXT NOT NULL DEFAULT 'chat',
                created_at  INTEGER NOT NULL
            );
            CREATE INDEX idx_tasks_project ON tasks(project);
            CREATE INDEX idx_tasks_deadline ON tasks(deadline);

            CREATE TABLE meetings (
                id            TEXT PRIMARY KEY,
                title         TEXT NOT NULL,
                summary       TEXT NOT NULL,
                transcript    TEXT NOT NULL,
                participants  TEXT NOT NULL DEFAULT '[]',
                action_items  TEXT NOT NULL DEFAULT '[]',
                key_decisions TEXT NOT NULL DEFAULT '[]',
                held_at       INTEGER,
                created_at    INTEGER NOT NULL
            );
            CREATE INDEX idx_meetings_created ON meetings(created_at);

            CREATE TABLE contacts (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                username   TEXT,
                chat_id    TEXT,
                aliases    TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL
            );
            CREATE INDEX idx_contacts_name ON contacts(name COLLATE NOCASE);
        "#,
    },
    Migration {
        version: 2,
        description: "document index: per-collection searchable documents",
        sql: r#"
            CREATE TABLE documents (
                collection TEXT NOT NULL CHECK(collection IN ('meetings','knowledge','tasks')),
                id         TEXT NOT NULL,
                content    TEXT NOT NULL,
                metadata   TEXT NOT NULL DEFAULT '{}',
                terms      TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX idx_documents_updated ON documents(collection, updated_at);
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// Run every migration newer than the recorded version.
///
/// Synchronous; [`Database::run_migrations`](crate::Database::run_migrations)
/// calls it on the blocking pool.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| migration_error(0, "create _migrations", e))?;

    let current = current_version(conn)?;
    let mut applied = 0usize;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(current_version = current, "schema is up to date");
    } else {
        info!(from = current, applied, "migrations applied");
    }
    Ok(())
}

/// Latest applied migration version, or 0 on a fresh database.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| migration_error(0, "read current version", e))
}

// ── internals ────────────────────────────────────────────────────────

fn migration_error(version: u32, step: &str, err: rusqlite::Error) -> StoreError {
    StoreError::Migration {
        version,
        message: format!("{step}: {err}"),
    }
}

/// Apply one migration inside an immediate transaction.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    let version = migration.version;
    info!(version, description = migration.description, "applying migration");

    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| migration_error(version, "begin", e))?;

    let body = conn
        .execute_batch(migration.sql)
        .and_then(|()| {
            conn.execute(
                "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![version, migration.description, chrono::Utc::now().timestamp()],
            )
        })
        .map_err(|e| migration_error(version, "execute", e));

    match body {
        Ok(_) => conn
            .execute_batch("COMMIT;")
            .map_err(|e| migration_error(version, "commit", e)),
        Err(err) => {
            warn!(version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
            Err(err)
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
