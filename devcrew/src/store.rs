//! Artifact archive backed by SQLite.
//!
//! Every run writes into a project namespace, so one database can hold
//! several generated systems side by side.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use devcrew_core::{ArtifactKind, ArtifactSink, SinkError};

/// A stored artifact.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub id: i64,
    pub project: String,
    pub kind: String,
    pub name: String,
    pub content: String,
    pub created_at: String,
}

/// SQLite artifact sink.
pub struct SqliteSink {
    db: Mutex<Connection>,
    project: String,
}

impl SqliteSink {
    /// Open or create an artifact database.
    pub fn open(path: &Path, project: &str) -> Result<Self> {
        let db = Connection::open(path).context("Failed to open artifact database")?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS artifacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(project, name)
            );
            CREATE INDEX IF NOT EXISTS idx_artifacts_project_kind
                ON artifacts(project, kind);",
        )?;
        Ok(Self { db: Mutex::new(db), project: project.to_string() })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory(project: &str) -> Result<Self> {
        Self::open(Path::new(":memory:"), project)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SinkError> {
        self.db.lock().map_err(|e| SinkError::Storage(format!("database lock poisoned: {e}")))
    }

    /// Latest content stored under `name`.
    pub fn get(&self, name: &str) -> Result<Option<String>, SinkError> {
        let db = self.conn()?;
        let mut stmt = db
            .prepare("SELECT content FROM artifacts WHERE project = ?1 AND name = ?2")
            .map_err(storage)?;
        let mut rows = stmt.query(rusqlite::params![self.project, name]).map_err(storage)?;
        match rows.next().map_err(storage)? {
            Some(row) => Ok(Some(row.get(0).map_err(storage)?)),
            None => Ok(None),
        }
    }

    /// All artifacts for this project, optionally of one kind, in insertion order.
    pub fn list(&self, kind: Option<ArtifactKind>) -> Result<Vec<StoredArtifact>, SinkError> {
        let db = self.conn()?;
        let mut stmt = db
            .prepare(
                "SELECT id, project, kind, name, content, created_at
                 FROM artifacts WHERE project = ?1 AND (?2 IS NULL OR kind = ?2)
                 ORDER BY id ASC",
            )
            .map_err(storage)?;
        let kind = kind.map(|k| k.as_str());
        let entries = stmt
            .query_map(rusqlite::params![self.project, kind], |row| {
                Ok(StoredArtifact {
                    id: row.get(0)?,
                    project: row.get(1)?,
                    kind: row.get(2)?,
                    name: row.get(3)?,
                    content: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        Ok(entries)
    }
}

fn storage(e: rusqlite::Error) -> SinkError {
    SinkError::Storage(e.to_string())
}

impl ArtifactSink for SqliteSink {
    fn put(&self, name: &str, kind: ArtifactKind, content: &str) -> Result<(), SinkError> {
        if name.trim().is_empty() {
            return Err(SinkError::InvalidName(name.to_string()));
        }
        let db = self.conn()?;
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO artifacts (project, kind, name, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project, name) DO UPDATE SET
                kind = excluded.kind,
                content = excluded.content,
                created_at = excluded.created_at",
            rusqlite::params![self.project, kind.as_str(), name, content, now],
        )
        .map_err(storage)?;
        Ok(())
    }
}
