//! Local-disk object store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::ObjectStore;

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve an object path under the root, rejecting traversal.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        if path.is_empty() || path.starts_with('/') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        for component in Path::new(path).components() {
            if matches!(component, std::path::Component::ParentDir) {
                return Err(StorageError::InvalidPath(path.to_string()));
            }
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(path))
            }
            Err(e) => Err(StorageError::DownloadFailed(e.to_string())),
        }
    }

    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        debug!("Wrote {}", full.display());
        Ok(format!("file://{}", full.display()))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(tmp.path());

        let url = store
            .put("videos/v1/audio.wav", b"RIFF".to_vec(), "audio/wav")
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(store.exists("videos/v1/audio.wav").await.unwrap());
        assert_eq!(store.get("videos/v1/audio.wav").await.unwrap(), b"RIFF");
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(tmp.path());

        let err = store.get("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
        let err = store.get("/abs/path").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }
}
