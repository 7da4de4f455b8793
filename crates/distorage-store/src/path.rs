use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};

/// Width, in hex characters, of each shard directory name.
pub const SHARD_WIDTH: usize = 5;

/// Number of shard directories a content-addressed key resolves to.
///
/// A SHA-256 digest is 64 hex characters; the trailing 4 characters that do
/// not fill a whole shard only appear in the file name.
pub const SHARD_DEPTH: usize = 64 / SHARD_WIDTH;

/// Location of a stored object relative to the store root.
///
/// The object lives at `root / segments[0] / ... / segments[n] / file_name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathKey {
    segments: Vec<String>,
    file_name: String,
}

impl PathKey {
    pub fn new(segments: Vec<String>, file_name: impl Into<String>) -> Self {
        Self {
            segments,
            file_name: file_name.into(),
        }
    }

    /// Ordered directory names between the root and the file.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Directory part joined with `/`, e.g. `0c5f4/70056/.../89e74`.
    pub fn path_name(&self) -> String {
        self.segments.join("/")
    }

    /// The top-level shard directory, which `delete` removes as a whole.
    pub fn shard(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Directory holding the object, relative to the root.
    pub fn dir_path(&self) -> PathBuf {
        self.segments.iter().collect()
    }

    /// Object file path, relative to the root.
    pub fn full_path(&self) -> PathBuf {
        let mut path = self.dir_path();
        path.push(&self.file_name);
        path
    }

    /// Reject keys whose path would leave the root or collapse onto it.
    pub(crate) fn validate(&self, key: &str) -> StoreResult<()> {
        let invalid = |reason: &str| StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if self.segments.is_empty() || self.file_name.is_empty() {
            return Err(invalid("empty path"));
        }
        for part in self.segments.iter().chain(std::iter::once(&self.file_name)) {
            if part.is_empty() {
                return Err(invalid("empty path component"));
            }
            for component in Path::new(part).components() {
                match component {
                    Component::Normal(_) => {}
                    Component::CurDir | Component::ParentDir => {
                        return Err(invalid("relative path component"))
                    }
                    Component::RootDir | Component::Prefix(_) => {
                        return Err(invalid("absolute path"))
                    }
                }
            }
        }
        Ok(())
    }
}

/// Strategy for mapping an opaque key onto the on-disk layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathTransform {
    /// SHA-256 the key, shard the hex digest into 5-character directories
    /// and use the full digest as the file name.
    #[default]
    #[serde(alias = "content-addressed")]
    Cas,
    /// Use the key verbatim as both directory and file name.
    Identity,
}

impl PathTransform {
    /// Resolve `key` to its location. Pure and deterministic.
    pub fn apply(&self, key: &str) -> PathKey {
        match self {
            Self::Cas => cas_path(key),
            Self::Identity => PathKey::new(vec![key.to_string()], key),
        }
    }
}

impl std::fmt::Display for PathTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cas => write!(f, "cas"),
            Self::Identity => write!(f, "identity"),
        }
    }
}

impl std::str::FromStr for PathTransform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cas" | "content-addressed" => Ok(Self::Cas),
            "identity" => Ok(Self::Identity),
            other => Err(format!("unknown path transform: {other}")),
        }
    }
}

fn cas_path(key: &str) -> PathKey {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    let segments = digest
        .as_bytes()
        .chunks_exact(SHARD_WIDTH)
        // Hex output is ASCII, so every chunk boundary is a char boundary.
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect();
    PathKey::new(segments, digest)
}
