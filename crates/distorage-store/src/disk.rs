use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::{StoreConfig, DEFAULT_ROOT};
use crate::error::{StoreError, StoreResult};
use crate::path::{PathKey, PathTransform};
use crate::traits::ContentStore;

/// Filesystem-backed content store.
///
/// Objects live at `root / <segments> / <file name>` as produced by the
/// configured [`PathTransform`]. Nothing besides the object files is written:
/// no index, no size or checksum records.
///
/// There is no locking. Concurrent writers to the same key interleave their
/// appended bytes, so callers must keep to one writer per key.
#[derive(Clone, Debug)]
pub struct DiskStore {
    root: PathBuf,
    transform: PathTransform,
}

impl DiskStore {
    /// Create a store from its configuration. An empty root falls back to
    /// [`DEFAULT_ROOT`]. No directories are created until the first write.
    pub fn new(config: StoreConfig) -> Self {
        let root = if config.root.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_ROOT)
        } else {
            config.root
        };
        Self {
            root,
            transform: config.transform,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn transform(&self) -> PathTransform {
        self.transform
    }

    /// Absolute (root-joined) path of the object stored under `key`.
    pub fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        Ok(self.root.join(self.locate(key)?.full_path()))
    }

    fn locate(&self, key: &str) -> StoreResult<PathKey> {
        let path_key = self.transform.apply(key);
        path_key.validate(key)?;
        Ok(path_key)
    }
}

#[async_trait]
impl ContentStore for DiskStore {
    fn resolve(&self, key: &str) -> PathKey {
        self.transform.apply(key)
    }

    async fn write(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<u64> {
        let path_key = self.locate(key)?;

        let dir = self.root.join(path_key.dir_path());
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        let path = dir.join(path_key.file_name());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;

        let written = tokio::io::copy(reader, &mut file)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        // tokio files complete writes in the background; flush before reporting.
        file.flush().await.map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        info!(key, bytes = written, path = %path.display(), "wrote object to disk");
        Ok(written)
    }

    async fn read(&self, key: &str) -> StoreResult<Cursor<Vec<u8>>> {
        let path = self.object_path(key)?;
        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    key: key.to_string(),
                })
            }
            Err(source) => return Err(StoreError::Open { path, source }),
        };

        let mut buf = Vec::new();
        let read = file
            .read_to_end(&mut buf)
            .await
            .map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;

        info!(key, bytes = read, path = %path.display(), "read object from disk");
        Ok(Cursor::new(buf))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.object_path(key)?;
        // symlink_metadata: a link at the object path counts, its target is never visited.
        match fs::symlink_metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path_key = self.locate(key)?;
        let Some(shard) = path_key.shard() else {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "empty path".into(),
            });
        };

        let target = self.root.join(shard);
        match fs::remove_dir_all(&target).await {
            Ok(()) => {
                info!(
                    key,
                    shard = %target.display(),
                    object = %self.root.join(path_key.full_path()).display(),
                    "deleted shard from disk"
                );
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Err(source) => Err(StoreError::Delete {
                path: target,
                source,
            }),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                info!(root = %self.root.display(), "removed storage root");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "storage root already absent");
                Ok(())
            }
            Err(source) => Err(StoreError::Delete {
                path: self.root.clone(),
                source,
            }),
        }
    }
}
