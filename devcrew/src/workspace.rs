//! Output directory for a generated project.

use std::path::{Component, Path, PathBuf};

use anyhow::Result;

use devcrew_core::{ArtifactKind, ArtifactSink, SinkError};

/// Writes artifacts as files under `root`.
pub struct DirectorySink {
    pub root: PathBuf,
}

impl DirectorySink {
    /// Create the output directory if needed.
    pub fn create(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self { root: root.to_path_buf() })
    }

    /// Resolve `name` inside the root. Absolute paths and `..` are rejected.
    fn resolve(&self, name: &str) -> Result<PathBuf, SinkError> {
        let rel = Path::new(name);
        let safe = !name.trim().is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(SinkError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(rel))
    }

    /// Read a file relative to the root.
    pub fn read_file(&self, name: &str) -> Result<String, SinkError> {
        Ok(std::fs::read_to_string(self.resolve(name)?)?)
    }

    /// List files recursively, relative to the root.
    pub fn list_files(&self) -> Vec<String> {
        let mut result = Vec::new();
        fn walk(dir: &Path, root: &Path, result: &mut Vec<String>) {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        let name = path.file_name().unwrap_or_default().to_string_lossy();
                        if name.starts_with('.') || name == "__pycache__" {
                            continue;
                        }
                        walk(&path, root, result);
                    } else if let Ok(rel) = path.strip_prefix(root) {
                        result.push(rel.to_string_lossy().to_string());
                    }
                }
            }
        }
        walk(&self.root, &self.root, &mut result);
        result.sort();
        result
    }
}

impl ArtifactSink for DirectorySink {
    fn put(&self, name: &str, kind: ArtifactKind, content: &str) -> Result<(), SinkError> {
        let full = self.resolve(name)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, content)?;
        tracing::debug!(file = name, %kind, bytes = content.len(), "Wrote artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::create(&dir.path().join("out")).unwrap();
        sink.put("counter.py", ArtifactKind::Module, "x = 1\n").unwrap();
        sink.put("tests/test_counter.py", ArtifactKind::Test, "def test_x(): pass\n").unwrap();
        assert_eq!(sink.list_files(), vec!["counter.py", "tests/test_counter.py"]);
        assert_eq!(sink.read_file("counter.py").unwrap(), "x = 1\n");
    }

    #[test]
    fn test_rejects_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::create(dir.path()).unwrap();
        for name in ["../evil.py", "/etc/passwd", "a/../../b.py", ""] {
            assert!(
                matches!(sink.put(name, ArtifactKind::Module, "x"), Err(SinkError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::create(dir.path()).unwrap();
        sink.put("README.md", ArtifactKind::Docs, "old").unwrap();
        sink.put("README.md", ArtifactKind::Docs, "new").unwrap();
        assert_eq!(sink.read_file("README.md").unwrap(), "new");
    }
}
