use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::path::PathTransform;

/// Root directory used when none is configured.
pub const DEFAULT_ROOT: &str = "distorage-data";

/// Storage settings, resolved once when a store is constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory under which every object is stored.
    pub root: PathBuf,
    /// How keys map onto paths below `root`.
    pub transform: PathTransform,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            transform: PathTransform::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>, transform: PathTransform) -> Self {
        Self {
            root: root.into(),
            transform,
        }
    }
}
