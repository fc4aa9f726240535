//! The directory inode and the materialization protocol.
//!
//! A [`TreeInode`] presents one directory to the dispatcher. Its contents
//! start as the image of an immutable store tree; the first mutation
//! promotes the directory (and every ancestor) into the overlay, after
//! which the overlay record is authoritative. All mutations follow the same
//! shape: preflight cheap preconditions under the read lock, materialize,
//! re-check and commit under the write lock, persist the directory, journal.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::fs::dir::{Dir, Entry};
use crate::fs::dir_handle::{DirHandleEntry, TreeInodeDirHandle};
use crate::fs::file_inode::{CreateResult, FileInode, OpenFile};
use crate::fs::inode_table::InodeRef;
use crate::fs::{InodeAttr, OpenFlags};
use crate::journal::JournalDelta;
use crate::model::ObjectId;
use crate::mount::MountInner;
use crate::name::{InodeId, NameNode, ROOT_INO};
use crate::overlay::OverlayError;
use crate::store::StoreError;

/// Errors surfaced by directory inode operations.
#[derive(Debug, Error)]
pub enum InodeError {
    #[error("{0}: no such entry")]
    NotFound(PathBuf),

    #[error("mkdir {0}: already exists in the overlay")]
    AlreadyExists(PathBuf),

    #[error("unlink {0}: is a directory")]
    UnlinkDirectory(PathBuf),

    #[error("rmdir {0}: is not a directory")]
    RmdirNotDirectory(PathBuf),

    #[error("rename over {0}: existing entry is not a directory")]
    RenameTargetNotDirectory(PathBuf),

    #[error("{0}: directory is not empty")]
    NotEmpty(PathBuf),

    #[error("rename target is not a directory inode")]
    CrossDevice,

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// An internal contract was violated; this is a bug, not a user error.
    #[error("inode contract violation: {0}")]
    Inconsistent(String),

    #[error("mount has been shut down")]
    MountShutDown,

    #[error("{0} is not implemented")]
    Unimplemented(&'static str),
}

impl From<InodeError> for i32 {
    fn from(e: InodeError) -> Self {
        match e {
            InodeError::NotFound(_) => libc::ENOENT,
            InodeError::AlreadyExists(_) => libc::EEXIST,
            InodeError::UnlinkDirectory(_) | InodeError::RmdirNotDirectory(_) => libc::EISDIR,
            InodeError::RenameTargetNotDirectory(_) => libc::ENOTDIR,
            InodeError::NotEmpty(_) => libc::ENOTEMPTY,
            InodeError::CrossDevice => libc::EXDEV,
            InodeError::Io { ref source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
            InodeError::Store(e) => i32::from(e),
            InodeError::Overlay(e) => i32::from(e),
            InodeError::Inconsistent(_) | InodeError::MountShutDown => libc::EIO,
            InodeError::Unimplemented(_) => libc::ENOSYS,
        }
    }
}

/// A directory inode over a snapshot tree and/or an overlay record.
///
/// Holds exactly one [`Dir`] under a reader-writer lock. The parent is
/// referenced by id and resolved through the inode table; the mount's
/// collaborators are reached through a weak handle.
#[derive(Debug)]
pub struct TreeInode {
    ino: InodeId,
    parent: InodeId,
    mount: Weak<MountInner>,
    contents: RwLock<Dir>,
}

impl TreeInode {
    pub(crate) fn new(mount: Weak<MountInner>, ino: InodeId, parent: InodeId, dir: Dir) -> Self {
        Self {
            ino,
            parent,
            mount,
            contents: RwLock::new(dir),
        }
    }

    /// The stable inode id.
    #[must_use]
    pub fn id(&self) -> InodeId {
        self.ino
    }

    /// The inode id of the parent directory (`ROOT_INO` parents itself).
    #[must_use]
    pub fn parent_id(&self) -> InodeId {
        self.parent
    }

    fn is_root(&self) -> bool {
        self.ino == ROOT_INO
    }

    fn mount(&self) -> Result<Arc<MountInner>, InodeError> {
        self.mount.upgrade().ok_or(InodeError::MountShutDown)
    }

    /// Path of this directory relative to the mount root.
    fn self_path(&self, mnt: &MountInner) -> Result<PathBuf, InodeError> {
        mnt.names.resolve_path(self.ino).ok_or_else(|| {
            error!(ino = self.ino, "inode has no name-manager node");
            InodeError::Inconsistent(format!("inode {} has no path", self.ino))
        })
    }

    /// Whether this directory has been promoted into the overlay.
    pub async fn is_materialized(&self) -> bool {
        self.contents.read().await.materialized
    }

    /// Whether the dispatcher may drop this inode from the table.
    ///
    /// A materialized directory holds the source of truth for its contents
    /// and must stay resident until the overlay is resaved.
    pub async fn can_forget(&self) -> bool {
        !self.contents.read().await.materialized
    }

    /// Snapshot of the entry named `name`, if present.
    pub(crate) async fn entry_snapshot(&self, name: &str) -> Option<Entry> {
        self.contents.read().await.entries.get(name).cloned()
    }

    /// Attributes of this directory.
    pub async fn getattr(&self) -> Result<InodeAttr, InodeError> {
        let contents = self.contents.read().await;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "directory entry counts fit in u32"
        )]
        let nlink = contents.entries.len() as u32 + 2;
        Ok(InodeAttr {
            ino: self.ino,
            mode: libc::S_IFDIR | 0o755,
            nlink,
            size: 0,
        })
    }

    /// Resolve `name` to a child inode, constructing it lazily.
    ///
    /// The decision of what to construct is made under the read lock; the
    /// lock is released before the store or overlay is awaited, and the
    /// result is reconciled with any racing construction through the inode
    /// table.
    pub async fn lookup(&self, name: &str) -> Result<InodeRef, InodeError> {
        let mnt = self.mount()?;
        let (node, entry) = {
            let contents = self.contents.read().await;
            let Some(entry) = contents.entries.get(name) else {
                return Err(InodeError::NotFound(self.child_path(&mnt, name)));
            };
            // Only allocate an inode id once we know the entry exists.
            let node = mnt.names.get_or_create(self.ino, name);
            (node, entry.clone())
        };
        self.resolve_child(&mnt, node, &entry).await
    }

    /// Open a handle over a consistent snapshot of this directory's entries.
    pub async fn opendir(&self) -> Result<TreeInodeDirHandle, InodeError> {
        let mnt = self.mount()?;
        let contents = self.contents.read().await;
        let mut entries = Vec::with_capacity(contents.entries.len());
        for (name, entry) in &contents.entries {
            let node = mnt.names.get_or_create(self.ino, name);
            entries.push(DirHandleEntry {
                name: name.clone(),
                ino: node.id,
                mode: entry.mode,
            });
        }
        Ok(TreeInodeDirHandle::new(entries))
    }

    fn child_path(&self, mnt: &MountInner, name: &str) -> PathBuf {
        mnt.names
            .resolve_path(self.ino)
            .unwrap_or_default()
            .join(name)
    }

    /// Build (or fetch, if already resident) the inode for an entry of this
    /// directory.
    async fn resolve_child(
        &self,
        mnt: &Arc<MountInner>,
        node: NameNode,
        entry: &Entry,
    ) -> Result<InodeRef, InodeError> {
        // A resident inode for this id short-circuits construction.
        if let Some(existing) = mnt.inodes.lookup(node.id) {
            return Ok(existing);
        }

        let inode = if entry.is_dir() {
            let dir = if !entry.materialized
                && let Some(hash) = entry.hash
            {
                let tree = mnt.store.fetch_tree(hash).await?;
                Dir::from_tree(&tree)
            } else {
                // Once materialized (or created without a backing tree), the
                // directory exists only in the overlay.
                let path = mnt.names.resolve_path(node.id).ok_or_else(|| {
                    error!(ino = node.id, "child inode has no resolvable path");
                    InodeError::Inconsistent(format!("inode {} has no path", node.id))
                })?;
                mnt.overlay.load_dir(&path).await?.ok_or_else(|| {
                    error!(
                        path = %path.display(),
                        "materialized directory has no overlay record"
                    );
                    InodeError::Inconsistent(format!(
                        "missing overlay record for {}",
                        path.display()
                    ))
                })?
            };
            InodeRef::Tree(Arc::new(TreeInode::new(
                Arc::downgrade(mnt),
                node.id,
                self.ino,
                dir,
            )))
        } else {
            InodeRef::File(Arc::new(FileInode::new(
                Arc::downgrade(mnt),
                node.id,
                self.ino,
            )))
        };

        // Reconcile with any construction that raced us.
        Ok(mnt.inodes.insert(inode))
    }

    /// Promote this directory and every ancestor into the overlay.
    ///
    /// Idempotent under concurrent callers. Locks are acquired root-down: no
    /// lock is held while recursing into the parent, and the parent's entry
    /// flag is updated only after this directory's own lock is released, so
    /// a task never takes a parent lock while holding a child's.
    pub fn materialize_self_and_ancestors(&self) -> BoxFuture<'_, Result<(), InodeError>> {
        Box::pin(async move {
            if self.contents.read().await.materialized {
                return Ok(());
            }

            let mnt = self.mount()?;
            if !self.is_root() {
                let parent = mnt
                    .inodes
                    .lookup(self.parent)
                    .and_then(InodeRef::into_tree)
                    .ok_or_else(|| {
                        error!(
                            ino = self.ino,
                            parent = self.parent,
                            "parent is not a resident tree inode"
                        );
                        InodeError::Inconsistent(format!(
                            "parent of inode {} is not resident",
                            self.ino
                        ))
                    })?;
                parent.materialize_self_and_ancestors().await?;
            }

            let promoted = {
                let mut contents = self.contents.write().await;
                if contents.materialized {
                    // Someone else materialized us in the meantime.
                    false
                } else {
                    let path = self.self_path(&mnt)?;
                    let content_path = mnt.overlay.content_dir().join(&path);
                    match tokio::fs::create_dir(&content_path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                        Err(e) => {
                            return Err(InodeError::Io {
                                path: content_path,
                                source: e,
                            });
                        }
                    }
                    contents.materialized = true;
                    mnt.overlay.save_dir(&path, &contents).await?;
                    debug!(ino = self.ino, path = %path.display(), "materialized directory");
                    true
                }
            };

            // Mark our entry in the parent and re-save it. Between our save
            // above and the parent's save here the on-disk parent briefly
            // lags its in-memory state; a crash in that window leaves our
            // own record authoritative and the flag is re-marked on the
            // next promotion. The parent is re-resolved here rather than
            // reusing the one recursed into above: a rename may have moved
            // us while no locks were held.
            if promoted && !self.is_root() {
                let node = mnt.names.get_by_id(self.ino).ok_or_else(|| {
                    error!(ino = self.ino, "inode has no name-manager node");
                    InodeError::Inconsistent(format!("inode {} has no name", self.ino))
                })?;
                let parent = mnt
                    .inodes
                    .lookup(node.parent)
                    .and_then(InodeRef::into_tree)
                    .ok_or_else(|| {
                        error!(
                            ino = self.ino,
                            parent = node.parent,
                            "parent is not a resident tree inode"
                        );
                        InodeError::Inconsistent(format!(
                            "parent of inode {} is not resident",
                            self.ino
                        ))
                    })?;
                let mut parent_contents = parent.contents.write().await;
                // A rename holds the parent locks while re-keying names, so
                // a stale placement is detectable under this lock; if we
                // moved again, leave the flag to the lag-window rules.
                let current = mnt.names.get_by_id(self.ino);
                if let Some(current) = current
                    && current.parent == parent.ino
                {
                    if let Some(entry) = parent_contents.entries.get_mut(&current.name)
                        && !entry.materialized
                    {
                        entry.materialized = true;
                        let parent_path = parent.self_path(&mnt)?;
                        mnt.overlay.save_dir(&parent_path, &parent_contents).await?;
                    }
                } else {
                    debug!(ino = self.ino, "entry moved during promotion; flag deferred");
                }
            }

            Ok(())
        })
    }

    /// Create and open a new file in this directory.
    ///
    /// The overlay file is opened read-write regardless of the caller's
    /// access mode, since it backs all future reads and writes of the
    /// inode. Existence races are left to the open itself (`O_EXCL`
    /// surfaces `EEXIST`).
    pub async fn create(
        &self,
        name: &str,
        _mode: u32,
        flags: OpenFlags,
    ) -> Result<CreateResult, InodeError> {
        use std::os::unix::fs::MetadataExt as _;

        let mnt = self.mount()?;
        self.materialize_self_and_ancestors().await?;

        let myname = self.self_path(&mnt)?;
        let target = myname.join(name);
        let file_path = mnt.overlay.content_dir().join(&target);

        let (inode, file, attr, node) = {
            let mut contents = self.contents.write().await;

            let passthrough =
                flags - (OpenFlags::RDONLY | OpenFlags::WRONLY | OpenFlags::RDWR | OpenFlags::CREAT);
            let file = tokio::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .mode(0o600)
                .custom_flags(passthrough.bits())
                .open(&file_path)
                .await
                .map_err(|e| InodeError::Io {
                    path: file_path.clone(),
                    source: e,
                })?;
            let meta = file.metadata().await.map_err(|e| InodeError::Io {
                path: file_path.clone(),
                source: e,
            })?;

            contents.entries.insert(
                name.to_owned(),
                Entry {
                    mode: meta.mode(),
                    hash: None,
                    materialized: true,
                },
            );

            let node = mnt.names.get_or_create(self.ino, name);
            let inode = Arc::new(FileInode::new(Arc::downgrade(&mnt), node.id, self.ino));
            drop(mnt.inodes.insert(InodeRef::File(Arc::clone(&inode))));

            let attr = InodeAttr {
                ino: node.id,
                mode: meta.mode(),
                nlink: 1,
                size: meta.len(),
            };

            mnt.overlay.save_dir(&myname, &contents).await?;
            (inode, file, attr, node)
        };

        mnt.journal.append(JournalDelta::new([target]));

        Ok(CreateResult {
            inode,
            file: OpenFile {
                fh: mnt.next_fh(),
                file,
            },
            attr,
            node,
        })
    }

    /// Create a subdirectory and resolve it to an inode.
    ///
    /// The new child's overlay record is saved before this returns, so a
    /// racing lookup never observes the entry without its record.
    pub async fn mkdir(&self, name: &str, mode: u32) -> Result<InodeRef, InodeError> {
        use std::os::unix::fs::MetadataExt as _;

        let mnt = self.mount()?;
        let myname = self.self_path(&mnt)?;
        let target = myname.join(name);

        // Preflight so a doomed mkdir does not materialize the ancestry.
        if self.contents.read().await.entries.contains_key(name) {
            return Err(InodeError::AlreadyExists(target));
        }

        self.materialize_self_and_ancestors().await?;

        {
            let mut contents = self.contents.write().await;
            if contents.entries.contains_key(name) {
                return Err(InodeError::AlreadyExists(target));
            }

            let dir_path = mnt.overlay.content_dir().join(&target);
            let mut builder = tokio::fs::DirBuilder::new();
            builder.mode(mode);
            builder.create(&dir_path).await.map_err(|e| InodeError::Io {
                path: dir_path.clone(),
                source: e,
            })?;

            // Recover the effective mode after the umask applied.
            let meta = tokio::fs::symlink_metadata(&dir_path)
                .await
                .map_err(|e| InodeError::Io {
                    path: dir_path.clone(),
                    source: e,
                })?;

            contents.entries.insert(
                name.to_owned(),
                Entry {
                    mode: meta.mode(),
                    hash: None,
                    materialized: true,
                },
            );
            mnt.overlay.save_dir(&myname, &contents).await?;
            mnt.overlay
                .save_dir(&target, &Dir::empty_materialized())
                .await?;
        }

        mnt.journal.append(JournalDelta::new([target]));

        self.lookup(name).await
    }

    /// Remove the file entry `name`.
    pub async fn unlink(&self, name: &str) -> Result<(), InodeError> {
        let mnt = self.mount()?;
        let myname = self.self_path(&mnt)?;
        let target = myname.join(name);

        // Preflight under the read lock so a spurious unlink cannot
        // materialize a tree it will never modify.
        {
            let contents = self.contents.read().await;
            let entry = contents
                .entries
                .get(name)
                .ok_or_else(|| InodeError::NotFound(target.clone()))?;
            if entry.is_dir() {
                return Err(InodeError::UnlinkDirectory(target));
            }
        }

        self.materialize_self_and_ancestors().await?;

        {
            let mut contents = self.contents.write().await;
            // Re-check: state may have moved between the two locks.
            let entry = contents
                .entries
                .get(name)
                .ok_or_else(|| InodeError::NotFound(target.clone()))?;
            if entry.is_dir() {
                return Err(InodeError::UnlinkDirectory(target));
            }

            if entry.materialized {
                let file_path = mnt.overlay.content_dir().join(&target);
                tokio::fs::remove_file(&file_path)
                    .await
                    .map_err(|e| InodeError::Io {
                        path: file_path,
                        source: e,
                    })?;
            }

            drop(contents.entries.remove(name));
            mnt.names.remove(self.ino, name);
            mnt.overlay.save_dir(&myname, &contents).await?;
        }

        mnt.journal.append(JournalDelta::new([target]));
        Ok(())
    }

    /// Remove the empty directory entry `name`.
    ///
    /// The preflight emptiness check is advisory; the commit repeats it
    /// while holding this directory's write lock and reading the target's
    /// contents, which is the authoritative answer.
    pub async fn rmdir(&self, name: &str) -> Result<(), InodeError> {
        let mnt = self.mount()?;
        let myname = self.self_path(&mnt)?;
        let target = myname.join(name);

        {
            let contents = self.contents.read().await;
            let child = self.child_tree_locked(&mnt, &contents, name, &target).await?;
            if !child.contents.read().await.entries.is_empty() {
                return Err(InodeError::NotEmpty(target));
            }
        }

        self.materialize_self_and_ancestors().await?;

        {
            let mut contents = self.contents.write().await;
            let child = self.child_tree_locked(&mnt, &contents, name, &target).await?;
            if !child.contents.read().await.entries.is_empty() {
                return Err(InodeError::NotEmpty(target));
            }

            let materialized = contents
                .entries
                .get(name)
                .is_some_and(|entry| entry.materialized);

            // The child's record lives inside its content directory, so it
            // must go before the directory itself.
            mnt.overlay.remove_dir(&target).await?;
            if materialized {
                let dir_path = mnt.overlay.content_dir().join(&target);
                tokio::fs::remove_dir(&dir_path)
                    .await
                    .map_err(|e| InodeError::Io {
                        path: dir_path,
                        source: e,
                    })?;
            }

            drop(contents.entries.remove(name));
            mnt.names.remove(self.ino, name);
            mnt.overlay.save_dir(&myname, &contents).await?;
        }

        mnt.journal.append(JournalDelta::new([target]));
        Ok(())
    }

    /// Resolve `name` inside an already-locked [`Dir`] to its tree inode,
    /// verifying it is a directory entry.
    async fn child_tree_locked(
        &self,
        mnt: &Arc<MountInner>,
        contents: &Dir,
        name: &str,
        target: &Path,
    ) -> Result<Arc<TreeInode>, InodeError> {
        let entry = contents
            .entries
            .get(name)
            .ok_or_else(|| InodeError::NotFound(target.to_path_buf()))?;
        if !entry.is_dir() {
            return Err(InodeError::RmdirNotDirectory(target.to_path_buf()));
        }
        let node = mnt.names.get_or_create(self.ino, name);
        let entry = entry.clone();
        self.resolve_child(mnt, node, &entry)
            .await?
            .into_tree()
            .ok_or_else(|| {
                error!(
                    path = %target.display(),
                    "directory entry did not resolve to a tree inode"
                );
                InodeError::Inconsistent(format!("{} is not a tree inode", target.display()))
            })
    }

    /// Move the entry `name` to `new_name` under `new_parent`.
    ///
    /// When source and destination differ, their write locks are acquired
    /// in ascending inode-id order so crossing renames cannot deadlock. The
    /// moved entry's value (hash included) carries over verbatim.
    pub async fn rename(
        &self,
        name: &str,
        new_parent: &InodeRef,
        new_name: &str,
    ) -> Result<(), InodeError> {
        let Some(dest) = new_parent.as_tree() else {
            return Err(InodeError::CrossDevice);
        };

        let mnt = self.mount()?;
        let src_dir_path = self.self_path(&mnt)?;
        let dst_dir_path = dest.self_path(&mnt)?;

        // Existence preflight only: the richer preconditions cannot be
        // checked race-free without both locks, and existence alone filters
        // most spurious requests before any materialization happens.
        if !self.contents.read().await.entries.contains_key(name) {
            return Err(InodeError::NotFound(src_dir_path.join(name)));
        }

        self.materialize_self_and_ancestors().await?;

        if dest.id() == self.ino {
            let mut contents = self.contents.write().await;
            self.rename_locked(
                &mnt,
                &mut contents,
                None,
                name,
                new_name,
                &src_dir_path,
                &dst_dir_path,
            )
            .await?;
        } else {
            dest.materialize_self_and_ancestors().await?;

            if self.ino < dest.id() {
                let mut src_contents = self.contents.write().await;
                let mut dst_contents = dest.contents.write().await;
                self.rename_locked(
                    &mnt,
                    &mut src_contents,
                    Some((dest, &mut *dst_contents)),
                    name,
                    new_name,
                    &src_dir_path,
                    &dst_dir_path,
                )
                .await?;
            } else {
                let mut dst_contents = dest.contents.write().await;
                let mut src_contents = self.contents.write().await;
                self.rename_locked(
                    &mnt,
                    &mut src_contents,
                    Some((dest, &mut *dst_contents)),
                    name,
                    new_name,
                    &src_dir_path,
                    &dst_dir_path,
                )
                .await?;
            }
        }

        mnt.journal.append(JournalDelta::new([
            src_dir_path.join(name),
            dst_dir_path.join(new_name),
        ]));
        Ok(())
    }

    /// The rename commit, with both directories (or the single shared one)
    /// locked by the caller.
    #[expect(
        clippy::too_many_arguments,
        reason = "mirrors the two-directory commit inputs"
    )]
    async fn rename_locked(
        &self,
        mnt: &Arc<MountInner>,
        source: &mut Dir,
        mut dest: Option<(&Arc<TreeInode>, &mut Dir)>,
        name: &str,
        new_name: &str,
        src_dir_path: &Path,
        dst_dir_path: &Path,
    ) -> Result<(), InodeError> {
        let source_path = src_dir_path.join(name);
        let dest_path = dst_dir_path.join(new_name);

        let Some(source_entry) = source.entries.get(name).cloned() else {
            return Err(InodeError::NotFound(source_path));
        };

        let dest_existing = match dest.as_ref() {
            Some((_, dst)) => dst.entries.get(new_name).cloned(),
            None => source.entries.get(new_name).cloned(),
        };

        // Renaming a directory over an existing name requires the existing
        // entry to be an empty directory.
        if source_entry.is_dir()
            && let Some(existing) = dest_existing
        {
            if !existing.is_dir() {
                return Err(InodeError::RenameTargetNotDirectory(dest_path));
            }
            let dest_owner: &TreeInode = dest.as_ref().map_or(self, |(inode, _)| inode.as_ref());
            let node = mnt.names.get_or_create(dest_owner.ino, new_name);
            let displaced = dest_owner
                .resolve_child(mnt, node, &existing)
                .await?
                .into_tree()
                .ok_or_else(|| {
                    error!(
                        path = %dest_path.display(),
                        "directory entry did not resolve to a tree inode"
                    );
                    InodeError::Inconsistent(format!(
                        "{} is not a tree inode",
                        dest_path.display()
                    ))
                })?;
            if !displaced.contents.read().await.entries.is_empty() {
                return Err(InodeError::NotEmpty(dest_path));
            }
        }

        // The overlay only has something to move once the source is
        // materialized; otherwise identity travels with the entry alone.
        if source_entry.materialized {
            let from = mnt.overlay.content_dir().join(&source_path);
            let to = mnt.overlay.content_dir().join(&dest_path);
            tokio::fs::rename(&from, &to)
                .await
                .map_err(|e| InodeError::Io {
                    path: from,
                    source: e,
                })?;
        }

        // Both locks are exclusive, so the entry checked above is still
        // present; move its value verbatim, overwriting any displaced
        // destination entry.
        if let Some(moved) = source.entries.remove(name) {
            match dest.as_mut() {
                Some((_, dst)) => drop(dst.entries.insert(new_name.to_owned(), moved)),
                None => drop(source.entries.insert(new_name.to_owned(), moved)),
            }
        }

        // Re-key live identity so existing ids resolve to the new path.
        let dest_owner_id = dest.as_ref().map_or(self.ino, |(inode, _)| inode.ino);
        mnt.names.rename(self.ino, name, dest_owner_id, new_name);

        mnt.overlay.save_dir(src_dir_path, source).await?;
        if let Some((_, dst)) = dest.as_ref() {
            mnt.overlay.save_dir(dst_dir_path, dst).await?;
        }
        Ok(())
    }

    /// Swap this tree to a new snapshot.
    pub async fn perform_checkout(&self, _hash: ObjectId) -> Result<(), InodeError> {
        Err(InodeError::Unimplemented("checkout"))
    }
}
