#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

use common::fixtures::{TestMount, dir_entry, file_entry, mount_over, oid, sample_mount};
use snap_fs::fs::OpenFlags;
use snap_fs::fs::inode_table::InodeRef;
use snap_fs::store::MemoryStore;

fn tree_ref(inode: &Arc<snap_fs::TreeInode>) -> InodeRef {
    InodeRef::Tree(Arc::clone(inode))
}

/// Mount over `{"d1": {"x": blob}, "d2": {}}`.
async fn two_dir_mount() -> TestMount {
    let store = Arc::new(MemoryStore::new());
    store.insert_blob(oid(1), Bytes::from_static(b"payload"));
    store.insert_tree(oid(2), vec![file_entry("x", oid(1))]);
    store.insert_tree(oid(3), vec![]);
    store.insert_tree(
        oid(4),
        vec![dir_entry("d1", oid(2)), dir_entry("d2", oid(3))],
    );
    mount_over(store, Some(oid(4))).await
}

#[tokio::test]
async fn rename_within_a_directory() {
    let t = sample_mount().await;
    let root = t.mount.root();

    root.rename("a", &tree_ref(root), "a2").await.unwrap();

    let err = root.lookup("a").await.unwrap_err();
    assert_eq!(i32::from(err), libc::ENOENT);
    assert!(matches!(
        root.lookup("a2").await.unwrap(),
        InodeRef::File(_)
    ));

    let deltas = t.mount.journal().deltas();
    assert_eq!(deltas.len(), 1);
    assert_eq!(
        deltas[0].paths,
        vec![PathBuf::from("a"), PathBuf::from("a2")]
    );
}

#[tokio::test]
async fn rename_preserves_the_entry_verbatim() {
    let t = sample_mount().await;
    let root = t.mount.root();

    root.rename("a", &tree_ref(root), "a2").await.unwrap();

    let record = t
        .mount
        .overlay()
        .load_dir(Path::new(""))
        .await
        .unwrap()
        .unwrap();
    let moved = record.entries.get("a2").expect("moved entry must exist");
    assert_eq!(moved.hash, Some(oid(1)), "the store hash travels along");
    assert!(!moved.materialized);
    assert_eq!(moved.mode, libc::S_IFREG | 0o644);
}

#[tokio::test]
async fn rename_across_directories_moves_the_entry_only() {
    let t = two_dir_mount().await;
    let root = t.mount.root();
    let d1 = root.lookup("d1").await.unwrap().into_tree().unwrap();
    let d2 = root.lookup("d2").await.unwrap().into_tree().unwrap();

    d1.rename("x", &tree_ref(&d2), "x").await.unwrap();

    assert!(d1.is_materialized().await);
    assert!(d2.is_materialized().await);

    let err = d1.lookup("x").await.unwrap_err();
    assert_eq!(i32::from(err), libc::ENOENT);
    assert!(matches!(d2.lookup("x").await.unwrap(), InodeRef::File(_)));

    // The source was never materialized, so nothing moved on disk.
    assert!(!t.content_exists("d1/x").await);
    assert!(!t.content_exists("d2/x").await);

    let deltas = t.mount.journal().deltas();
    assert_eq!(
        deltas.last().unwrap().paths,
        vec![PathBuf::from("d1/x"), PathBuf::from("d2/x")]
    );
}

#[tokio::test]
async fn rename_of_materialized_file_moves_overlay_content() {
    let t = two_dir_mount().await;
    let root = t.mount.root();
    let d1 = root.lookup("d1").await.unwrap().into_tree().unwrap();
    let d2 = root.lookup("d2").await.unwrap().into_tree().unwrap();

    d1.create("f", 0o644, OpenFlags::empty()).await.unwrap();
    assert!(t.content_exists("d1/f").await);

    d1.rename("f", &tree_ref(&d2), "f").await.unwrap();
    assert!(!t.content_exists("d1/f").await);
    assert!(t.content_exists("d2/f").await);
}

#[tokio::test]
async fn rename_missing_source_is_enoent() {
    let t = sample_mount().await;
    let root = t.mount.root();

    let err = root
        .rename("ghost", &tree_ref(root), "x")
        .await
        .unwrap_err();
    assert_eq!(i32::from(err), libc::ENOENT);
    assert!(!root.is_materialized().await);
    assert!(t.mount.journal().is_empty());
}

#[tokio::test]
async fn rename_into_a_file_inode_is_exdev() {
    let t = sample_mount().await;
    let root = t.mount.root();
    let file = root.lookup("a").await.unwrap();

    let err = root.rename("a", &file, "x").await.unwrap_err();
    assert_eq!(i32::from(err), libc::EXDEV);
    assert!(t.mount.journal().is_empty());
}

#[tokio::test]
async fn rename_directory_over_non_empty_directory_is_refused() {
    let t = sample_mount().await;
    let root = t.mount.root();

    // "empty" is an empty directory, "sub" contains "c".
    let err = root
        .rename("empty", &tree_ref(root), "sub")
        .await
        .unwrap_err();
    assert_eq!(i32::from(err), libc::ENOTEMPTY);
    assert!(t.mount.journal().is_empty());
}

#[tokio::test]
async fn rename_directory_over_file_is_enotdir() {
    let t = sample_mount().await;
    let root = t.mount.root();

    let err = root
        .rename("empty", &tree_ref(root), "a")
        .await
        .unwrap_err();
    assert_eq!(i32::from(err), libc::ENOTDIR);
}

#[tokio::test]
async fn rename_directory_over_empty_directory_displaces_it() {
    let t = sample_mount().await;
    let root = t.mount.root();

    root.rename("sub", &tree_ref(root), "empty").await.unwrap();

    let moved = root
        .lookup("empty")
        .await
        .unwrap()
        .into_tree()
        .expect("destination must now be the moved directory");
    assert!(matches!(moved.lookup("c").await.unwrap(), InodeRef::File(_)));

    let err = root.lookup("sub").await.unwrap_err();
    assert_eq!(i32::from(err), libc::ENOENT);

    let handle = root.opendir().await.unwrap();
    let names: Vec<_> = handle.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a", "empty"]);
}

#[tokio::test]
async fn renamed_directory_children_resolve_under_the_new_path() {
    let t = two_dir_mount().await;
    let root = t.mount.root();
    let d1 = root.lookup("d1").await.unwrap().into_tree().unwrap();
    let x_id = d1.lookup("x").await.unwrap().id();

    root.rename("d1", &tree_ref(root), "moved").await.unwrap();

    let moved = root.lookup("moved").await.unwrap().into_tree().unwrap();
    assert_eq!(moved.id(), d1.id(), "the directory keeps its identity");
    assert_eq!(moved.lookup("x").await.unwrap().id(), x_id);

    assert_eq!(
        t.mount.name_manager().resolve_path(x_id).unwrap(),
        PathBuf::from("moved/x")
    );
}

#[tokio::test]
async fn rename_of_materialized_directory_carries_its_records() {
    let t = two_dir_mount().await;
    let root = t.mount.root();
    let d1 = root.lookup("d1").await.unwrap().into_tree().unwrap();

    // Materialize d1 by creating inside it, then move it.
    d1.create("f", 0o644, OpenFlags::empty()).await.unwrap();
    root.rename("d1", &tree_ref(root), "moved").await.unwrap();

    assert!(t.content_exists("moved/f").await);
    assert!(
        t.mount
            .overlay()
            .load_dir(Path::new("moved"))
            .await
            .unwrap()
            .is_some(),
        "the directory record must travel with the rename"
    );
    assert!(
        t.mount
            .overlay()
            .load_dir(Path::new("d1"))
            .await
            .unwrap()
            .is_none()
    );
}
