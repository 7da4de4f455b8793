use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::path::{PathKey, PathTransform};
use crate::traits::ContentStore;

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. Objects are keyed by their resolved
/// relative path, so append and shard-deletion behave exactly as they do on
/// disk.
pub struct InMemoryStore {
    transform: PathTransform,
    objects: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new(transform: PathTransform) -> Self {
        Self {
            transform,
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    fn locate(&self, key: &str) -> StoreResult<PathKey> {
        let path_key = self.transform.apply(key);
        path_key.validate(key)?;
        Ok(path_key)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(PathTransform::default())
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    fn resolve(&self, key: &str) -> PathKey {
        self.transform.apply(key)
    }

    async fn write(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<u64> {
        let path = self.locate(key)?.full_path();
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;

        let written = buf.len() as u64;
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(path).or_default().extend_from_slice(&buf);
        debug!(key, bytes = written, "wrote object to memory");
        Ok(written)
    }

    async fn read(&self, key: &str) -> StoreResult<Cursor<Vec<u8>>> {
        let path = self.locate(key)?.full_path();
        let map = self.objects.read().expect("lock poisoned");
        match map.get(&path) {
            Some(data) => {
                debug!(key, bytes = data.len(), "read object from memory");
                Ok(Cursor::new(data.clone()))
            }
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.locate(key)?.full_path();
        Ok(self.objects.read().expect("lock poisoned").contains_key(&path))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path_key = self.locate(key)?;
        let shard = PathBuf::from(path_key.shard().unwrap_or_default());

        let mut map = self.objects.write().expect("lock poisoned");
        let before = map.len();
        map.retain(|path, _| !path.starts_with(&shard));
        let removed = before - map.len();
        if removed == 0 {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        debug!(key, removed, "deleted shard from memory");
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.objects.write().expect("lock poisoned").clear();
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("transform", &self.transform)
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_exists() {
        let store = InMemoryStore::default();
        assert!(!store.exists("k").await.unwrap());
        store.write_bytes("k", b"hello").await.unwrap();
        assert!(store.exists("k").await.unwrap());
        assert_eq!(store.read_bytes("k").await.unwrap(), b"hello");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn writes_append() {
        let store = InMemoryStore::default();
        store.write_bytes("k", b"12345").await.unwrap();
        store.write_bytes("k", b"6789").await.unwrap();
        assert_eq!(store.read_bytes("k").await.unwrap(), b"123456789");
        assert_eq!(store.total_bytes(), 9);
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let store = InMemoryStore::default();
        assert!(store.read("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_is_shard_wide() {
        let store = InMemoryStore::new(PathTransform::Identity);
        store.write_bytes("a", b"1").await.unwrap();
        store.write_bytes("a/nested", b"2").await.unwrap();
        store.write_bytes("b", b"3").await.unwrap();

        store.delete("a").await.unwrap();
        assert!(!store.exists("a").await.unwrap());
        assert!(!store.exists("a/nested").await.unwrap());
        assert!(store.exists("b").await.unwrap());
        assert!(store.delete("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn clear_removes_all() {
        let store = InMemoryStore::default();
        store.write_bytes("a", b"1").await.unwrap();
        store.write_bytes("b", b"2").await.unwrap();
        store.clear().await.unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryStore::default();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryStore"));
        assert!(debug.contains("object_count"));
    }
}
