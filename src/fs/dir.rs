//! In-memory directory images and their overlay record form.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::model::{ObjectId, Tree, is_dir_mode};

/// One child record of a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Type and permission bits, as for `stat`.
    pub mode: u32,

    /// Content address of the backing store object: a tree for directories,
    /// a blob for files. A non-materialized entry always carries one; a
    /// materialized entry may keep it as the advisory ancestor hash.
    pub hash: Option<ObjectId>,

    /// `true` once the canonical contents live in the overlay rather than
    /// the store.
    pub materialized: bool,
}

impl Entry {
    /// Whether this entry names a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        is_dir_mode(self.mode)
    }
}

/// The in-memory image of one directory.
///
/// This is also the overlay record format: a materialized directory's `Dir`
/// is persisted verbatim and loaded back on the next mount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dir {
    /// Children, keyed by path component.
    pub entries: FxHashMap<String, Entry>,

    /// `true` once this directory's entry set is authoritative from the
    /// overlay.
    pub materialized: bool,

    /// The ancestor tree id, when known.
    pub tree_hash: Option<ObjectId>,
}

impl Dir {
    /// Build the non-materialized image of a store tree: every child carries
    /// its store hash and none are materialized.
    #[must_use]
    pub fn from_tree(tree: &Tree) -> Self {
        let mut entries = FxHashMap::default();
        for tree_entry in tree.entries() {
            entries.insert(
                tree_entry.name.clone(),
                Entry {
                    mode: tree_entry.mode,
                    hash: Some(tree_entry.hash),
                    materialized: false,
                },
            );
        }
        Self {
            entries,
            materialized: false,
            tree_hash: Some(tree.hash()),
        }
    }

    /// An empty directory that exists only in the overlay.
    #[must_use]
    pub fn empty_materialized() -> Self {
        Self {
            entries: FxHashMap::default(),
            materialized: true,
            tree_hash: None,
        }
    }
}
