//! File inodes over their parent's entry.
//!
//! A file inode holds no file state of its own: mode, hash, and
//! materialization all live in the parent directory's entry for it, read
//! under the parent's lock. The parent is referenced by id and resolved
//! through the inode table.

use std::sync::{Arc, Weak};

use tracing::error;

use crate::fs::InodeAttr;
use crate::fs::dir::Entry;
use crate::fs::inode_table::InodeRef;
use crate::fs::tree_inode::InodeError;
use crate::mount::MountInner;
use crate::name::{InodeId, NameNode};

/// A regular-file inode.
#[derive(Debug)]
pub struct FileInode {
    ino: InodeId,
    parent: InodeId,
    mount: Weak<MountInner>,
}

impl FileInode {
    pub(crate) fn new(mount: Weak<MountInner>, ino: InodeId, parent: InodeId) -> Self {
        Self { ino, parent, mount }
    }

    /// The stable inode id.
    #[must_use]
    pub fn id(&self) -> InodeId {
        self.ino
    }

    /// The inode id of the parent directory.
    #[must_use]
    pub fn parent_id(&self) -> InodeId {
        self.parent
    }

    fn mount(&self) -> Result<Arc<MountInner>, InodeError> {
        self.mount.upgrade().ok_or(InodeError::MountShutDown)
    }

    /// Snapshot this file's entry in its parent directory.
    async fn entry(&self, mnt: &Arc<MountInner>) -> Result<Entry, InodeError> {
        let node = mnt.names.get_by_id(self.ino).ok_or_else(|| {
            error!(ino = self.ino, "file inode has no name-manager node");
            InodeError::Inconsistent(format!("inode {} has no name", self.ino))
        })?;
        let parent = mnt
            .inodes
            .lookup(self.parent)
            .and_then(InodeRef::into_tree)
            .ok_or_else(|| {
                error!(
                    ino = self.ino,
                    parent = self.parent,
                    "file inode's parent is not a resident tree inode"
                );
                InodeError::Inconsistent(format!("parent of inode {} is not resident", self.ino))
            })?;
        parent
            .entry_snapshot(&node.name)
            .await
            .ok_or_else(|| InodeError::NotFound(node.name.into()))
    }

    /// Attributes of this file.
    ///
    /// The size comes from the overlay file when the entry is materialized,
    /// otherwise from the backing blob.
    pub async fn getattr(&self) -> Result<InodeAttr, InodeError> {
        let mnt = self.mount()?;
        let entry = self.entry(&mnt).await?;

        let size = if entry.materialized {
            let path = mnt.names.resolve_path(self.ino).ok_or_else(|| {
                error!(ino = self.ino, "file inode has no resolvable path");
                InodeError::Inconsistent(format!("inode {} has no path", self.ino))
            })?;
            let full = mnt.overlay.content_dir().join(path);
            tokio::fs::metadata(&full)
                .await
                .map_err(|e| InodeError::Io {
                    path: full,
                    source: e,
                })?
                .len()
        } else {
            let Some(hash) = entry.hash else {
                error!(ino = self.ino, "unmaterialized entry without a blob hash");
                return Err(InodeError::Inconsistent(format!(
                    "inode {} has neither overlay content nor a blob",
                    self.ino
                )));
            };
            let blob = mnt.store.fetch_blob(hash).await?;
            blob.len() as u64
        };

        Ok(InodeAttr {
            ino: self.ino,
            mode: entry.mode,
            nlink: 1,
            size,
        })
    }
}

/// An open overlay file, as returned by `create`.
#[derive(Debug)]
pub struct OpenFile {
    /// File handle number, suitable for returning to the dispatcher.
    pub fh: u64,
    /// The already-open backing file in the overlay content area.
    pub file: tokio::fs::File,
}

/// Everything the dispatcher needs to answer a `create`.
#[derive(Debug)]
pub struct CreateResult {
    /// The new file inode.
    pub inode: Arc<FileInode>,
    /// An open handle on the new overlay file.
    pub file: OpenFile,
    /// Attributes of the new file.
    pub attr: InodeAttr,
    /// The identity record allocated for the new file.
    pub node: NameNode,
}
