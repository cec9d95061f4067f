//! # Storage
//!
//! File persistence for scenario input and generated artifacts.
//! Failures are returned to the caller, never swallowed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::StorageError;
use crate::schema::GeneratedArtifact;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `content` to `path`, creating parent directories
    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError>;

    /// Read `path`; `Ok(None)` when it does not exist
    async fn read(&self, path: &Path) -> Result<Option<String>, StorageError>;

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError>;
}

/// Filesystem storage resolving relative paths against a base directory
#[derive(Debug, Clone)]
pub struct FsStorage {
    base: PathBuf,
}

impl FsStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Storage rooted at the process working directory
    pub fn current_dir() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            self.ensure_directory(parent).await?;
        }
        fs::write(&full, content)
            .await
            .map_err(|source| StorageError::Io {
                action: "write",
                path: full.clone(),
                source,
            })?;
        tracing::debug!(path = ?full, bytes = content.len(), "File written");
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Option<String>, StorageError> {
        let full = self.resolve(path);
        match fs::read_to_string(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                action: "read",
                path: full,
                source,
            }),
        }
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        let full = self.resolve(path);
        fs::create_dir_all(&full)
            .await
            .map_err(|source| StorageError::Io {
                action: "create directory",
                path: full,
                source,
            })
    }
}

/// Persist the artifact and its companion under `output_dir`.
///
/// Returns the written paths, primary file first. These are the exact
/// paths a publish step stages.
pub async fn save_artifact(
    storage: &dyn Storage,
    output_dir: &Path,
    artifact: &GeneratedArtifact,
) -> Result<Vec<PathBuf>, StorageError> {
    storage.ensure_directory(output_dir).await?;

    let mut written = Vec::with_capacity(2);
    let primary = output_dir.join(&artifact.file_name);
    storage.write(&primary, &artifact.source_text).await?;
    written.push(primary);

    if let Some(companion) = &artifact.companion {
        let path = output_dir.join(&companion.file_name);
        storage.write(&path, &companion.source_text).await?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CompanionFile;

    fn artifact(companion: Option<CompanionFile>) -> GeneratedArtifact {
        GeneratedArtifact {
            file_name: "test_login.py".to_string(),
            source_text: "def test_a():\n    pass\n".to_string(),
            artifact_count: 1,
            is_syntactically_valid: true,
            review_notes: Vec::new(),
            companion,
        }
    }

    #[tokio::test]
    async fn test_write_read_roundtrip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        storage
            .write(Path::new("a/b/scenario.txt"), "Feature: Login")
            .await
            .unwrap();
        let content = storage.read(Path::new("a/b/scenario.txt")).await.unwrap();
        assert_eq!(content.as_deref(), Some("Feature: Login"));
        assert!(storage.read(Path::new("nope.txt")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), "file").unwrap();
        let storage = FsStorage::new(dir.path());

        let err = storage
            .write(Path::new("blocker/test.py"), "x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("blocker"));
    }

    #[tokio::test]
    async fn test_save_artifact_with_companion() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let companion = CompanionFile {
            file_name: "conftest.py".to_string(),
            source_text: "import pytest\n".to_string(),
            is_syntactically_valid: true,
        };

        let paths = save_artifact(&storage, Path::new("out"), &artifact(Some(companion)))
            .await
            .unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("out/test_login.py"),
                PathBuf::from("out/conftest.py")
            ]
        );
        assert!(dir.path().join("out/conftest.py").exists());
    }

    #[tokio::test]
    async fn test_save_artifact_without_companion() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let paths = save_artifact(&storage, Path::new("out"), &artifact(None))
            .await
            .unwrap();
        assert_eq!(paths.len(), 1);
    }
}
