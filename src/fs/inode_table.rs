//! Process-wide registry of live inodes.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::name::InodeId;

use super::file_inode::FileInode;
use super::tree_inode::TreeInode;

/// A live inode: a directory or a file.
///
/// The variant is the type discriminator; callers that need a directory
/// match on `Tree` instead of probing runtime types.
#[derive(Clone, Debug)]
pub enum InodeRef {
    /// A directory inode.
    Tree(Arc<TreeInode>),
    /// A file inode.
    File(Arc<FileInode>),
}

impl InodeRef {
    /// The stable inode id.
    #[must_use]
    pub fn id(&self) -> InodeId {
        match self {
            InodeRef::Tree(tree) => tree.id(),
            InodeRef::File(file) => file.id(),
        }
    }

    /// Borrow the directory inode, if this is one.
    #[must_use]
    pub fn as_tree(&self) -> Option<&Arc<TreeInode>> {
        match self {
            InodeRef::Tree(tree) => Some(tree),
            InodeRef::File(_) => None,
        }
    }

    /// Take the directory inode, if this is one.
    #[must_use]
    pub fn into_tree(self) -> Option<Arc<TreeInode>> {
        match self {
            InodeRef::Tree(tree) => Some(tree),
            InodeRef::File(_) => None,
        }
    }
}

/// Registry mapping inode ids to live inode objects.
///
/// The table owns every live inode; parent links between inodes are ids
/// resolved through here, never owning pointers, so no reference cycles can
/// form.
#[derive(Default)]
pub struct InodeTable {
    nodes: scc::HashMap<InodeId, InodeRef>,
}

impl InodeTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the live inode for `id`, if resident.
    #[must_use]
    pub fn lookup(&self, id: InodeId) -> Option<InodeRef> {
        self.nodes.read(&id, |_, inode| inode.clone())
    }

    /// Insert `inode`, returning the resident entry.
    ///
    /// If a racing task registered the same id first, the earlier inode wins
    /// and is returned; the caller's construction is discarded.
    pub fn insert(&self, inode: InodeRef) -> InodeRef {
        use scc::hash_map::Entry;

        match self.nodes.entry(inode.id()) {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(vacant) => {
                vacant.insert_entry(inode.clone());
                inode
            }
        }
    }

    /// Drop the registry's reference to `id` if the inode can be forgotten.
    ///
    /// A materialized directory is the sole source of truth for its contents
    /// and stays resident; forgetting it is refused.
    pub async fn forget(&self, id: InodeId) -> bool {
        let Some(inode) = self.lookup(id) else {
            warn!(ino = id, "forget for an inode that is not resident");
            return false;
        };
        if let InodeRef::Tree(tree) = &inode
            && !tree.can_forget().await
        {
            debug!(ino = id, "retaining materialized directory");
            return false;
        }
        self.nodes.remove(&id).is_some()
    }

    /// Number of resident inodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
