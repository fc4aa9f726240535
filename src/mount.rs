//! Mount wiring: one snapshot-backed tree plus its overlay and registries.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::fs::dir::Dir;
use crate::fs::inode_table::{InodeRef, InodeTable};
use crate::fs::tree_inode::{InodeError, TreeInode};
use crate::journal::Journal;
use crate::model::ObjectId;
use crate::name::{NameManager, ROOT_INO};
use crate::overlay::Overlay;
use crate::store::ObjectStore;

/// The collaborators shared by every inode of a mount.
///
/// Inodes hold this through a weak handle: the inode table (owned here)
/// holds the inodes themselves, so the back-edge must not own.
pub struct MountInner {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) overlay: Arc<dyn Overlay>,
    pub(crate) journal: Journal,
    pub(crate) names: NameManager,
    pub(crate) inodes: InodeTable,
    next_fh: AtomicU64,
}

impl MountInner {
    /// Allocate a fresh file handle number. Starts at 1 (0 is reserved).
    pub(crate) fn next_fh(&self) -> u64 {
        self.next_fh.fetch_add(1, Ordering::Relaxed)
    }
}

/// One mounted snapshot-backed tree.
pub struct Mount {
    inner: Arc<MountInner>,
    root: Arc<TreeInode>,
}

impl Mount {
    /// Open a mount over `store` and `overlay`, rooted at `root_tree`.
    ///
    /// A root record already present in the overlay is authoritative and
    /// wins over the snapshot; with neither, the mount starts from an empty
    /// materialized root.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        overlay: Arc<dyn Overlay>,
        root_tree: Option<ObjectId>,
    ) -> Result<Self, InodeError> {
        let inner = Arc::new(MountInner {
            store,
            overlay,
            journal: Journal::new(),
            names: NameManager::new(),
            inodes: InodeTable::new(),
            next_fh: AtomicU64::new(1),
        });

        let root_dir = if let Some(dir) = inner.overlay.load_dir(Path::new("")).await? {
            debug!("root loaded from overlay record");
            dir
        } else if let Some(hash) = root_tree {
            let tree = inner.store.fetch_tree(hash).await?;
            debug!(%hash, "root built from snapshot tree");
            Dir::from_tree(&tree)
        } else {
            debug!("root starts empty and materialized");
            Dir::empty_materialized()
        };

        let root = Arc::new(TreeInode::new(
            Arc::downgrade(&inner),
            ROOT_INO,
            ROOT_INO,
            root_dir,
        ));
        drop(inner.inodes.insert(InodeRef::Tree(Arc::clone(&root))));

        Ok(Self { inner, root })
    }

    /// The root directory inode.
    #[must_use]
    pub fn root(&self) -> &Arc<TreeInode> {
        &self.root
    }

    /// The mount's journal.
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.inner.journal
    }

    /// The mount's inode table.
    #[must_use]
    pub fn inode_table(&self) -> &InodeTable {
        &self.inner.inodes
    }

    /// The mount's name manager.
    #[must_use]
    pub fn name_manager(&self) -> &NameManager {
        &self.inner.names
    }

    /// The mount's overlay.
    #[must_use]
    pub fn overlay(&self) -> &Arc<dyn Overlay> {
        &self.inner.overlay
    }
}
