//! Filesystem core: directory inodes, file inodes, and their registries.

/// In-memory directory images and their overlay record form.
pub mod dir;
/// Directory handles: readdir snapshots.
pub mod dir_handle;
/// File inodes over their parent's entry.
pub mod file_inode;
/// Process-wide registry of live inodes.
pub mod inode_table;
/// The directory inode and the materialization protocol.
pub mod tree_inode;

use bitflags::bitflags;

use crate::name::InodeId;

/// Attributes reported for an inode, as the dispatcher consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeAttr {
    /// The stable inode id.
    pub ino: InodeId,
    /// Type and permission bits, as for `stat`.
    pub mode: u32,
    /// Link count. For directories this counts entries plus the `.` and
    /// `..` links.
    pub nlink: u32,
    /// Size in bytes (zero for directories).
    pub size: u64,
}

bitflags! {
    /// Flags for opening a file, similar to Unix open(2) flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: i32 {
        /// Open for reading only.
        const RDONLY = libc::O_RDONLY;
        /// Open for writing only.
        const WRONLY = libc::O_WRONLY;
        /// Open for reading and writing.
        const RDWR = libc::O_RDWR;

        /// Append on each write.
        const APPEND = libc::O_APPEND;
        /// Truncate to zero length.
        const TRUNC = libc::O_TRUNC;
        /// Create file if it does not exist.
        const CREAT = libc::O_CREAT;
        /// Error if file already exists (with `CREAT`).
        const EXCL = libc::O_EXCL;

        /// Non-blocking mode.
        const NONBLOCK = libc::O_NONBLOCK;
        /// Synchronous writes.
        const SYNC = libc::O_SYNC;
        /// Synchronous data integrity writes.
        const DSYNC = libc::O_DSYNC;
        /// Do not follow symlinks.
        const NOFOLLOW = libc::O_NOFOLLOW;
        /// Set close-on-exec.
        const CLOEXEC = libc::O_CLOEXEC;

        /// Do not update access time (Linux only).
        #[cfg(target_os = "linux")]
        const NOATIME = libc::O_NOATIME;
    }
}
