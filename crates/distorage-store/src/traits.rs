use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::StoreResult;
use crate::path::PathKey;

/// Key-addressed byte store.
///
/// All implementations must satisfy these invariants:
/// - `resolve` is pure: the same key always yields the same [`PathKey`].
/// - Writes append. A second write under a key extends the object; callers
///   that want replace semantics delete first.
/// - No metadata is kept. An object exists iff its file exists.
/// - `delete` removes the whole top-level shard of the key, which takes every
///   other object in that shard with it.
/// - Errors are returned to the caller, never swallowed.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Resolve a key to its location relative to the store root.
    fn resolve(&self, key: &str) -> PathKey;

    /// Append everything `reader` yields to the object under `key`, creating
    /// it (and its shard directories) if needed. Returns the bytes written.
    async fn write(&self, key: &str, reader: &mut (dyn AsyncRead + Unpin + Send))
        -> StoreResult<u64>;

    /// Read the whole object under `key` into memory.
    async fn read(&self, key: &str) -> StoreResult<Cursor<Vec<u8>>>;

    /// Whether an object is stored under `key`.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Remove the top-level shard directory containing `key`.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Remove every stored object.
    async fn clear(&self) -> StoreResult<()>;

    /// Convenience wrapper over [`ContentStore::write`] for in-memory data.
    async fn write_bytes(&self, key: &str, data: &[u8]) -> StoreResult<u64> {
        let mut reader = data;
        self.write(key, &mut reader).await
    }

    /// Convenience wrapper over [`ContentStore::read`] returning the bytes.
    async fn read_bytes(&self, key: &str) -> StoreResult<Vec<u8>> {
        Ok(self.read(key).await?.into_inner())
    }
}
