//! Stable inode identity and path resolution.
//!
//! Inode ids are allocated on demand, keyed by `(parent id, name)`, and stay
//! stable for the lifetime of the node. Paths are resolved by walking the
//! parent chain, so a rename of one directory implicitly moves every node
//! beneath it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-scoped identifier of a directory or file inode.
pub type InodeId = u64;

/// The inode id of every mount's root directory.
///
/// The root parents itself; monotonic allocation starts at `ROOT_INO + 1`.
pub const ROOT_INO: InodeId = 1;

/// Identity record for one inode: its id and its place in the name tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameNode {
    /// The stable inode id.
    pub id: InodeId,
    /// Inode id of the parent directory (`ROOT_INO` for the root itself).
    pub parent: InodeId,
    /// Path component within the parent (empty for the root).
    pub name: String,
}

/// Allocator and resolver of stable inode ids.
///
/// All methods take `&self`; internal synchronization is provided by
/// `scc::HashMap`.
pub struct NameManager {
    /// `(parent id, name) -> inode id`. Removed on unlink/rmdir and re-keyed
    /// on rename so a deleted name never resurrects its old id.
    by_name: scc::HashMap<(InodeId, String), InodeId>,

    /// `inode id -> node`. Nodes outlive their `by_name` mapping so that a
    /// live handle can still resolve the last path it was reachable under.
    by_id: scc::HashMap<InodeId, NameNode>,

    next: AtomicU64,
}

impl NameManager {
    /// Create a manager holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        let by_id = scc::HashMap::new();
        drop(by_id.insert(
            ROOT_INO,
            NameNode {
                id: ROOT_INO,
                parent: ROOT_INO,
                name: String::new(),
            },
        ));
        Self {
            by_name: scc::HashMap::new(),
            by_id,
            next: AtomicU64::new(ROOT_INO + 1),
        }
    }

    /// Fetch the node for `(parent, name)`, allocating a fresh id if none
    /// exists yet.
    pub fn get_or_create(&self, parent: InodeId, name: &str) -> NameNode {
        use scc::hash_map::Entry;

        match self.by_name.entry((parent, name.to_owned())) {
            Entry::Occupied(occupied) => {
                let id = *occupied.get();
                self.by_id
                    .read(&id, |_, node| node.clone())
                    .unwrap_or(NameNode {
                        id,
                        parent,
                        name: name.to_owned(),
                    })
            }
            Entry::Vacant(vacant) => {
                let id = self.next.fetch_add(1, Ordering::Relaxed);
                let node = NameNode {
                    id,
                    parent,
                    name: name.to_owned(),
                };
                drop(self.by_id.insert(id, node.clone()));
                vacant.insert_entry(id);
                node
            }
        }
    }

    /// Fetch the node for `(parent, name)` without allocating.
    #[must_use]
    pub fn get_if_exists(&self, parent: InodeId, name: &str) -> Option<NameNode> {
        let id = self
            .by_name
            .read(&(parent, name.to_owned()), |_, id| *id)?;
        self.get_by_id(id)
    }

    /// Fetch a node by its id.
    #[must_use]
    pub fn get_by_id(&self, id: InodeId) -> Option<NameNode> {
        self.by_id.read(&id, |_, node| node.clone())
    }

    /// Resolve an id to its path relative to the mount root.
    ///
    /// The root resolves to the empty path. Returns `None` if the id (or any
    /// ancestor) is unknown.
    #[must_use]
    pub fn resolve_path(&self, id: InodeId) -> Option<PathBuf> {
        if id == ROOT_INO {
            return Some(PathBuf::new());
        }

        let mut components = Vec::new();
        let mut current = id;
        while current != ROOT_INO {
            let (name, parent) = self
                .by_id
                .read(&current, |_, node| (node.name.clone(), node.parent))?;
            components.push(name);
            current = parent;
        }

        components.reverse();
        Some(components.into_iter().collect())
    }

    /// Move the node at `(old_parent, old_name)` to `(new_parent, new_name)`,
    /// keeping its id. A node displaced at the destination keeps its id but
    /// loses its name mapping — even when the source never had a node, since
    /// the destination entry has been overwritten either way.
    pub fn rename(&self, old_parent: InodeId, old_name: &str, new_parent: InodeId, new_name: &str) {
        let source = self.by_name.remove(&(old_parent, old_name.to_owned()));
        drop(self.by_name.remove(&(new_parent, new_name.to_owned())));

        let Some((_, id)) = source else { return };
        drop(
            self.by_name
                .insert((new_parent, new_name.to_owned()), id),
        );
        let _ = self.by_id.update(&id, |_, node| {
            node.parent = new_parent;
            node.name = new_name.to_owned();
        });
    }

    /// Drop the name mapping for `(parent, name)`.
    ///
    /// The node itself stays resolvable by id; a later `get_or_create` for
    /// the same name allocates a fresh id.
    pub fn remove(&self, parent: InodeId, name: &str) {
        drop(self.by_name.remove(&(parent, name.to_owned())));
    }
}

impl Default for NameManager {
    fn default() -> Self {
        Self::new()
    }
}
