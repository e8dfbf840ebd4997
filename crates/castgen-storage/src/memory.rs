//! In-memory object store for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::ObjectStore;

/// HashMap-backed store. Cheap to clone; clones share contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<String, (Vec<u8>, String)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StorageError::not_found(path))
    }

    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String> {
        self.objects
            .write()
            .await
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(format!("memory://{}", path))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(path))
    }
}
