//! Path and directory management.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fs::naming::{audio_extension, extension_from_url};

/// Files involved in downloading one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPaths {
    dir: PathBuf,
    stem: String,
}

impl EntryPaths {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    /// Intermediate video track file.
    pub fn video(&self) -> PathBuf {
        self.dir.join(format!("{}_video.mp4", self.stem))
    }

    /// Intermediate audio track file.
    pub fn audio(&self) -> PathBuf {
        self.dir.join(format!("{}_audio.mp4", self.stem))
    }

    /// Muxed (or video-only) output.
    pub fn output(&self) -> PathBuf {
        self.dir.join(format!("{}.mp4", self.stem))
    }

    /// Standalone audio output, named by codec.
    pub fn audio_output(&self, codec: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.stem, audio_extension(codec)))
    }

    /// Output for a combined audio+video stream, named after its URL.
    pub fn combined_output(&self, url: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.stem, extension_from_url(url)))
    }
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| Error::assembly(path, e))?;
    }
    Ok(())
}

/// Move `from` to `to`, replacing any existing file.
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if tokio::fs::try_exists(to).await.unwrap_or(false) {
        tokio::fs::remove_file(to)
            .await
            .map_err(|e| Error::assembly(to, e))?;
    }
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| Error::assembly(to, e))
}

/// Remove a file, ignoring a missing one.
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::assembly(path, e)),
    }
}
