//! Per-batch scratch directories.
//!
//! Every batch gets its own directory under the scratch root. All staged
//! uploads and derived artifacts (frames, PDF images, audio chunks) live
//! inside it and are removed when the batch ends, whatever the outcome.

use crate::error::{IngestError, IngestResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Staged uploads, grouped by classified kind.
pub const PDFS_DIR: &str = "pdfs";
pub const VIDEOS_DIR: &str = "videos";
pub const IMAGES_DIR: &str = "images";
pub const AUDIO_DIR: &str = "audio";
pub const TEXT_DIR: &str = "text";

/// Derived artifacts.
pub const EXTRACTED_IMAGES_DIR: &str = "extracted_images";
pub const VIDEO_FRAMES_DIR: &str = "video_frames";
pub const EXTRACTED_AUDIO_DIR: &str = "extracted_audio";
pub const AUDIO_CHUNKS_DIR: &str = "audio_chunks";

/// Root under which batch directories are created.
#[derive(Debug, Clone)]
pub struct ScratchArea {
    root: PathBuf,
}

impl ScratchArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh directory for one batch.
    pub fn acquire(&self, batch_id: &str) -> IngestResult<WorkDir> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            IngestError::Scratch(format!("cannot create {}: {}", self.root.display(), e))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("batch-{}-", batch_id))
            .tempdir_in(&self.root)
            .map_err(|e| {
                IngestError::Scratch(format!("cannot create batch dir in {}: {}", self.root.display(), e))
            })?;

        debug!("Acquired scratch dir {:?}", dir.path());
        Ok(WorkDir { dir: Some(dir) })
    }
}

/// A batch's scratch directory. Removed on [`WorkDir::release`] or drop.
#[derive(Debug)]
pub struct WorkDir {
    dir: Option<TempDir>,
}

impl WorkDir {
    pub fn path(&self) -> &Path {
        self.dir.as_ref().map(|d| d.path()).unwrap_or_else(|| Path::new(""))
    }

    /// Path of a named subdirectory, created on first use.
    pub fn subdir(&self, name: &str) -> IngestResult<PathBuf> {
        let path = self.path().join(name);
        std::fs::create_dir_all(&path).map_err(|e| {
            IngestError::Scratch(format!("cannot create {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// Remove the directory and everything in it.
    pub fn release(mut self) -> IngestResult<()> {
        match self.dir.take() {
            Some(dir) => {
                let path = dir.path().to_path_buf();
                dir.close().map_err(|e| {
                    IngestError::Scratch(format!("cannot remove {}: {}", path.display(), e))
                })?;
                debug!("Released scratch dir {:?}", path);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Deletes a single file when dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {:?}: {}", self.path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let root = tempfile::tempdir().unwrap();
        let area = ScratchArea::new(root.path().join("scratch"));

        let work = area.acquire("b1").unwrap();
        let frames = work.subdir(VIDEO_FRAMES_DIR).unwrap();
        std::fs::write(frames.join("f.png"), b"png").unwrap();
        let path = work.path().to_path_buf();
        assert!(path.starts_with(area.root()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("batch-b1-"));

        work.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_batches_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let area = ScratchArea::new(root.path());

        let a = area.acquire("same").unwrap();
        let b = area.acquire("same").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_drop_removes_dir() {
        let root = tempfile::tempdir().unwrap();
        let area = ScratchArea::new(root.path());
        let path = {
            let work = area.acquire("dropped").unwrap();
            work.subdir(AUDIO_CHUNKS_DIR).unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk_000.mp3");
        std::fs::write(&path, b"x").unwrap();
        {
            let guard = ScratchFile::new(&path);
            assert!(guard.path().exists());
        }
        assert!(!path.exists());

        // Already gone is fine.
        drop(ScratchFile::new(dir.path().join("missing.mp3")));
    }
}
