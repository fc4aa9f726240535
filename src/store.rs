//! Read-only content-addressed object store.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::model::{ObjectId, Tree, TreeEntry};

/// Errors raised while fetching store objects.
///
/// A missing object for a hash the core holds is a consistency violation,
/// not a user error, and therefore maps to `EIO`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object {0} not found in store")]
    NotFound(ObjectId),

    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for i32 {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => libc::EIO,
            StoreError::Io(ref io_err) => io_err.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

/// Provider of immutable snapshot data.
///
/// Safe for unconstrained concurrent access; nothing in the store ever
/// changes once written.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the tree object named by `id`.
    async fn fetch_tree(&self, id: ObjectId) -> Result<Tree, StoreError>;

    /// Fetch the blob object named by `id`.
    async fn fetch_blob(&self, id: ObjectId) -> Result<Bytes, StoreError>;
}

/// An in-memory object store.
///
/// Objects are inserted under caller-chosen ids, which makes this both the
/// test fixture backend and a usable store for fully in-memory mounts.
#[derive(Default)]
pub struct MemoryStore {
    trees: scc::HashMap<ObjectId, Arc<Tree>>,
    blobs: scc::HashMap<ObjectId, Bytes>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tree object under `id`, replacing any previous object.
    pub fn insert_tree(&self, id: ObjectId, entries: Vec<TreeEntry>) {
        let tree = Arc::new(Tree::new(id, entries));
        drop(self.trees.remove(&id));
        drop(self.trees.insert(id, tree));
    }

    /// Insert a blob object under `id`, replacing any previous object.
    pub fn insert_blob(&self, id: ObjectId, data: impl Into<Bytes>) {
        drop(self.blobs.remove(&id));
        drop(self.blobs.insert(id, data.into()));
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn fetch_tree(&self, id: ObjectId) -> Result<Tree, StoreError> {
        self.trees
            .read(&id, |_, tree| Tree::clone(tree))
            .ok_or(StoreError::NotFound(id))
    }

    async fn fetch_blob(&self, id: ObjectId) -> Result<Bytes, StoreError> {
        self.blobs
            .read(&id, |_, blob| blob.clone())
            .ok_or(StoreError::NotFound(id))
    }
}
