//! Object storage behind one interface.
//!
//! Every pipeline stage reads and writes through [`ObjectStore`], so the
//! same code runs against S3-compatible cloud storage, a local directory,
//! or the in-memory store used by tests.

pub mod error;
pub mod keys;
pub mod local;
pub mod memory;
pub mod s3;

pub use error::{StorageError, StorageResult};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use s3::{S3Config, S3Store};

use std::path::Path;

use async_trait::async_trait;

/// Interface to an object store.
///
/// `put` is idempotent for a given path: writing the same path twice
/// overwrites, which is what lets stages re-run safely on retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object's bytes.
    async fn get(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Write an object and return its URL.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String>;

    /// Check whether an object exists.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Download an object to a local file.
    async fn get_to_file(&self, path: &str, dest: &Path) -> StorageResult<()> {
        let bytes = self.get(path).await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }

    /// Upload a local file as an object.
    async fn put_file(
        &self,
        path: &str,
        source: &Path,
        content_type: &str,
    ) -> StorageResult<String> {
        let bytes = tokio::fs::read(source).await?;
        self.put(path, bytes, content_type).await
    }
}
