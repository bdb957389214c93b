//! Where generated artifacts go.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Architecture,
    Module,
    Integration,
    Test,
    Demo,
    Docs,
    RunLog,
    /// Project extras such as dependency manifests.
    Manifest,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Architecture => "architecture",
            ArtifactKind::Module => "module",
            ArtifactKind::Integration => "integration",
            ArtifactKind::Test => "test",
            ArtifactKind::Demo => "demo",
            ArtifactKind::Docs => "docs",
            ArtifactKind::RunLog => "run_log",
            ArtifactKind::Manifest => "manifest",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("invalid artifact name {0:?}")]
    InvalidName(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Accepts named artifacts. Writing the same name twice replaces it.
pub trait ArtifactSink {
    fn put(&self, name: &str, kind: ArtifactKind, content: &str) -> Result<(), SinkError>;
}

/// Keeps artifacts in memory, mostly for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    items: std::sync::Mutex<Vec<(String, ArtifactKind, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let items = self.items.lock().ok()?;
        items.iter().find(|(n, _, _)| n == name).map(|(_, _, c)| c.clone())
    }

    pub fn names(&self) -> Vec<String> {
        match self.items.lock() {
            Ok(items) => items.iter().map(|(n, _, _)| n.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl ArtifactSink for MemorySink {
    fn put(&self, name: &str, kind: ArtifactKind, content: &str) -> Result<(), SinkError> {
        let mut items = self.items.lock().map_err(|e| SinkError::Storage(e.to_string()))?;
        match items.iter_mut().find(|(n, _, _)| n == name) {
            Some(item) => *item = (name.to_string(), kind, content.to_string()),
            None => items.push((name.to_string(), kind, content.to_string())),
        }
        Ok(())
    }
}
