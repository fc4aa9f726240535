//! Writable per-mount overlay storage.
//!
//! The overlay holds everything the mount has changed locally: a content
//! area mirroring the tree's shape on disk, plus one record per materialized
//! directory storing its [`Dir`] image. Records live *inside* their content
//! directory, so an OS rename of a materialized directory carries the
//! records of its whole subtree along with it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt as _;

use crate::fs::dir::Dir;

/// Name of the per-directory record file inside the content area.
///
/// Reserved: the core never creates entries with this name.
pub const DIR_RECORD_NAME: &str = ".snapfs-dir";

/// Errors raised by overlay persistence.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("overlay i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed overlay record at {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<OverlayError> for i32 {
    fn from(e: OverlayError) -> Self {
        match e {
            OverlayError::Io { ref source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
            OverlayError::Record { .. } => libc::EIO,
        }
    }
}

/// Mutable per-mount storage for locally modified content.
///
/// `save_dir` returns only once the record is durable, and the record is
/// observable by a subsequent `load_dir` in the same process.
#[async_trait]
pub trait Overlay: Send + Sync {
    /// Absolute path of the content area. Materialized files and directory
    /// containers live under here at their mount-relative paths.
    fn content_dir(&self) -> &Path;

    /// Load the record for the directory at mount-relative `path`, if one
    /// has been saved.
    async fn load_dir(&self, path: &Path) -> Result<Option<Dir>, OverlayError>;

    /// Persist the record for the directory at mount-relative `path`.
    async fn save_dir(&self, path: &Path, dir: &Dir) -> Result<(), OverlayError>;

    /// Remove the record for the directory at mount-relative `path`.
    /// Removing a record that was never saved is a no-op.
    async fn remove_dir(&self, path: &Path) -> Result<(), OverlayError>;
}

/// Filesystem-backed [`Overlay`] rooted at a local directory.
pub struct DiskOverlay {
    content: PathBuf,
}

impl DiskOverlay {
    /// Open (creating if needed) an overlay rooted at `content`.
    pub async fn open(content: impl Into<PathBuf>) -> Result<Self, OverlayError> {
        let content = content.into();
        tokio::fs::create_dir_all(&content)
            .await
            .map_err(|e| io_err(&content, e))?;
        Ok(Self { content })
    }

    fn record_path(&self, path: &Path) -> PathBuf {
        self.content.join(path).join(DIR_RECORD_NAME)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> OverlayError {
    OverlayError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl Overlay for DiskOverlay {
    fn content_dir(&self) -> &Path {
        &self.content
    }

    async fn load_dir(&self, path: &Path) -> Result<Option<Dir>, OverlayError> {
        let record = self.record_path(path);
        let bytes = match tokio::fs::read(&record).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&record, e)),
        };
        let dir = serde_json::from_slice(&bytes).map_err(|e| OverlayError::Record {
            path: record,
            source: e,
        })?;
        Ok(Some(dir))
    }

    async fn save_dir(&self, path: &Path, dir: &Dir) -> Result<(), OverlayError> {
        let record = self.record_path(path);
        let bytes = serde_json::to_vec(dir).map_err(|e| OverlayError::Record {
            path: record.clone(),
            source: e,
        })?;

        // Write-then-rename so a crash mid-save never leaves a truncated
        // record behind.
        let tmp = record.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| io_err(&tmp, e))?;
        file.write_all(&bytes).await.map_err(|e| io_err(&tmp, e))?;
        file.sync_all().await.map_err(|e| io_err(&tmp, e))?;
        tokio::fs::rename(&tmp, &record)
            .await
            .map_err(|e| io_err(&record, e))?;
        Ok(())
    }

    async fn remove_dir(&self, path: &Path) -> Result<(), OverlayError> {
        let record = self.record_path(path);
        match tokio::fs::remove_file(&record).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&record, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::fs::dir::Entry;
    use crate::model::ObjectId;

    async fn overlay() -> (tempfile::TempDir, DiskOverlay) {
        let tmp = tempfile::tempdir().unwrap();
        let overlay = DiskOverlay::open(tmp.path().join("overlay")).await.unwrap();
        (tmp, overlay)
    }

    fn sample_dir() -> Dir {
        let mut dir = Dir::empty_materialized();
        dir.entries.insert(
            "a".to_owned(),
            Entry {
                mode: libc::S_IFREG | 0o644,
                hash: Some(ObjectId::from_bytes([7u8; 20])),
                materialized: false,
            },
        );
        dir.tree_hash = Some(ObjectId::from_bytes([9u8; 20]));
        dir
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (_tmp, overlay) = overlay().await;
        let dir = sample_dir();

        overlay.save_dir(Path::new(""), &dir).await.unwrap();
        let loaded = overlay.load_dir(Path::new("")).await.unwrap().unwrap();
        assert_eq!(loaded, dir);
    }

    #[tokio::test]
    async fn save_is_read_your_writes() {
        let (_tmp, overlay) = overlay().await;
        tokio::fs::create_dir(overlay.content_dir().join("sub"))
            .await
            .unwrap();

        overlay
            .save_dir(Path::new("sub"), &Dir::empty_materialized())
            .await
            .unwrap();
        assert!(overlay.load_dir(Path::new("sub")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn load_of_unsaved_directory_is_none() {
        let (_tmp, overlay) = overlay().await;
        assert!(overlay.load_dir(Path::new("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_tolerates_missing_records() {
        let (_tmp, overlay) = overlay().await;
        overlay.remove_dir(Path::new("never-saved")).await.unwrap();

        overlay
            .save_dir(Path::new(""), &Dir::empty_materialized())
            .await
            .unwrap();
        overlay.remove_dir(Path::new("")).await.unwrap();
        assert!(overlay.load_dir(Path::new("")).await.unwrap().is_none());
    }
}
