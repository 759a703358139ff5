//! On-disk layout for downloaded tracks

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::utils::sanitize_filename;

/// Extension of every produced file
pub const AUDIO_EXTENSION: &str = "mp3";

/// Where a track lands on disk
///
/// A pure function of the (artist, album, title) triple and the root, so the
/// file path doubles as the idempotency key for a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Sanitized artist, as used in paths, tags and the search query
    pub artist: String,
    /// Sanitized album
    pub album: String,
    /// Sanitized title
    pub title: String,
    /// `root/artist/album`
    pub album_dir: PathBuf,
    /// `album_dir/"{artist} - {title}.mp3"`
    pub file_path: PathBuf,
}

impl DownloadTarget {
    pub fn new(root: &Path, artist: &str, album: &str, title: &str) -> Self {
        let artist = component_or(artist, "Unknown Artist");
        let album = component_or(album, "Unknown Album");
        let title = component_or(title, "Unknown Title");

        let album_dir = root.join(&artist).join(&album);
        let file_path = album_dir.join(format!("{} - {}.{}", artist, title, AUDIO_EXTENSION));

        Self {
            artist,
            album,
            title,
            album_dir,
            file_path,
        }
    }

    /// File name without directory, for status lines
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Template handed to yt-dlp, which fills in the extension itself
    pub fn output_template(&self) -> PathBuf {
        self.album_dir
            .join(format!("{} - {}.%(ext)s", self.artist, self.title))
    }

    /// Create the album directory (and parents); fine if it already exists
    pub async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.album_dir)
            .await
            .with_context(|| format!("Failed to create album directory {}", self.album_dir.display()))?;

        debug!("Album folder ready: {}", self.album_dir.display());
        Ok(())
    }
}

/// Sanitize one path component, substituting a placeholder when nothing is left
pub fn component_or(raw: &str, placeholder: &str) -> String {
    let cleaned = sanitize_filename(raw);
    if cleaned.is_empty() {
        placeholder.to_string()
    } else {
        cleaned
    }
}
