//! Object storage seam.
//!
//! The engine reads raw document bytes and writes acquired text and final
//! records through [`ObjectStore`]. Durable storage is an external
//! collaborator; [`FsObjectStore`] maps keys onto a local directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Key prefix for raw document bytes.
pub const RAW_PREFIX: &str = "raw";
/// Key prefix for acquired text.
pub const TEXT_PREFIX: &str = "text";
/// Key prefix for final JSON records.
pub const RECORD_PREFIX: &str = "records";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key for the acquired text of a document.
pub fn text_key(document_id: &str) -> String {
    format!("{}/{}.txt", TEXT_PREFIX, document_id)
}

/// Key for the final record of a document.
pub fn record_key(document_id: &str) -> String {
    format!("{}/{}.json", RECORD_PREFIX, document_id)
}

/// Read/write access to object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn put(&self, key: &str, content: &[u8]) -> Result<(), StorageError>;
}

/// Object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path under the root, refusing traversal.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(key);
        let valid = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn put(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Readers never observe a partial object.
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.put(&record_key("doc-1"), b"{}").await.unwrap();
        assert_eq!(store.get("records/doc-1.json").await.unwrap(), b"{}");
        assert!(dir.path().join("records").join("doc-1.json").exists());
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());
        let err = store.get("raw/missing.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());
        assert!(matches!(
            store.get("../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put("/abs/path", b"x").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_keys() {
        assert_eq!(text_key("abc"), "text/abc.txt");
        assert_eq!(record_key("abc"), "records/abc.json");
    }
}
