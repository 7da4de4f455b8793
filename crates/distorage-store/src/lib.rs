//! Content-addressable storage for distorage nodes.
//!
//! Arbitrary byte streams are stored under string keys. A [`PathTransform`]
//! maps each key onto a relative path; with the default content-addressed
//! transform the key is hashed with SHA-256 and the 64-character hex digest
//! is cut into twelve 5-character shard directories, with the full digest as
//! the file name:
//!
//! ```text
//! bestpicture -> 0c5f4/70056/f2abe/.../89e74/0c5f470056f2...749f3c
//! ```
//!
//! # Storage Backends
//!
//! All backends implement the [`ContentStore`] trait:
//!
//! - [`DiskStore`] -- files under a configured root directory
//! - [`InMemoryStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Semantics
//!
//! 1. Writes append; nothing is ever overwritten in place.
//! 2. No metadata is kept. Existence is presence of the object file.
//! 3. Deletion removes the key's whole top-level shard directory, including
//!    any other objects that happen to share it.
//! 4. There is no cross-operation locking; one writer per key.

pub mod config;
pub mod disk;
pub mod error;
pub mod memory;
pub mod path;
pub mod traits;

pub use config::{StoreConfig, DEFAULT_ROOT};
pub use disk::DiskStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use path::{PathKey, PathTransform, SHARD_DEPTH, SHARD_WIDTH};
pub use traits::ContentStore;
