#![allow(missing_docs, clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

use snap_fs::model::{ObjectId, TreeEntry};
use snap_fs::mount::Mount;
use snap_fs::overlay::DiskOverlay;
use snap_fs::store::MemoryStore;

pub const FILE_MODE: u32 = libc::S_IFREG | 0o644;
pub const DIR_MODE: u32 = libc::S_IFDIR | 0o755;

/// Shorthand object id: every byte set to `byte`.
pub fn oid(byte: u8) -> ObjectId {
    ObjectId::from_bytes([byte; 20])
}

pub fn file_entry(name: &str, hash: ObjectId) -> TreeEntry {
    TreeEntry {
        name: name.to_owned(),
        mode: FILE_MODE,
        hash,
    }
}

pub fn dir_entry(name: &str, hash: ObjectId) -> TreeEntry {
    TreeEntry {
        name: name.to_owned(),
        mode: DIR_MODE,
        hash,
    }
}

/// A mount over a [`MemoryStore`] and a tempdir-backed [`DiskOverlay`].
///
/// The tempdir is owned here so the overlay outlives every test assertion.
pub struct TestMount {
    pub mount: Mount,
    pub store: Arc<MemoryStore>,
    tmp: tempfile::TempDir,
}

impl TestMount {
    /// Absolute path of the overlay content area.
    pub fn content_path(&self, rel: &str) -> PathBuf {
        self.mount.overlay().content_dir().join(rel)
    }

    /// Whether a file or directory exists in the overlay content area.
    pub async fn content_exists(&self, rel: &str) -> bool {
        tokio::fs::symlink_metadata(self.content_path(rel))
            .await
            .is_ok()
    }
}

pub async fn mount_over(store: Arc<MemoryStore>, root_tree: Option<ObjectId>) -> TestMount {
    let tmp = tempfile::tempdir().unwrap();
    let overlay = Arc::new(DiskOverlay::open(tmp.path().join("overlay")).await.unwrap());
    let mount = Mount::open(Arc::clone(&store) as Arc<dyn snap_fs::store::ObjectStore>, overlay, root_tree)
        .await
        .unwrap();
    TestMount { mount, store, tmp }
}

/// The sample snapshot used across suites:
///
/// ```text
/// /
/// ├── a       file, blob oid(1) = b"alpha"
/// ├── sub/    tree oid(3)
/// │   └── c   file, blob oid(4) = b"gamma"
/// └── empty/  tree oid(5), no entries
/// ```
///
/// Root tree id is `oid(2)`.
pub async fn sample_mount() -> TestMount {
    let store = Arc::new(MemoryStore::new());
    store.insert_blob(oid(1), Bytes::from_static(b"alpha"));
    store.insert_blob(oid(4), Bytes::from_static(b"gamma"));
    store.insert_tree(oid(3), vec![file_entry("c", oid(4))]);
    store.insert_tree(oid(5), vec![]);
    store.insert_tree(
        oid(2),
        vec![
            file_entry("a", oid(1)),
            dir_entry("sub", oid(3)),
            dir_entry("empty", oid(5)),
        ],
    );
    mount_over(store, Some(oid(2))).await
}
