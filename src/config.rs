//! Settings persistence
//!
//! Stores the download directory, audio quality and external tool locations in
//! ~/.config/tunefetch/settings.json. The token file lives next to it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const APP_DIR: &str = "tunefetch";
const SETTINGS_FILE: &str = "settings.json";

/// Target MP3 bitrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Quality {
    #[value(name = "190")]
    #[serde(rename = "190")]
    Kbps190,
    #[default]
    #[value(name = "320")]
    #[serde(rename = "320")]
    Kbps320,
}

impl Quality {
    pub fn kbps(self) -> u32 {
        match self {
            Self::Kbps190 => 190,
            Self::Kbps320 => 320,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kbps", self.kbps())
    }
}

impl FromStr for Quality {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_end_matches("kbps").trim() {
            "190" => Ok(Self::Kbps190),
            "320" => Ok(Self::Kbps320),
            other => anyhow::bail!("Invalid quality '{}'. Must be 190 or 320.", other),
        }
    }
}

/// Persistent application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root of all downloaded collections
    pub download_dir: PathBuf,
    /// Bitrate for new downloads
    #[serde(default)]
    pub quality: Quality,
    /// yt-dlp executable
    #[serde(default = "default_ytdlp")]
    pub ytdlp_path: PathBuf,
    /// ffmpeg location handed to yt-dlp; yt-dlp searches PATH when unset
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

fn default_ytdlp() -> PathBuf {
    PathBuf::from("yt-dlp")
}

impl Settings {
    /// Defaults rooted at a given config directory
    pub fn defaults_in(app_dir: &Path) -> Self {
        Self {
            download_dir: app_dir.join("downloads"),
            quality: Quality::default(),
            ytdlp_path: default_ytdlp(),
            ffmpeg_path: None,
        }
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Result<Self> {
        let app_dir = app_dir()?;
        Self::load_from(&app_dir)
    }

    /// Load settings from a specific config directory
    pub fn load_from(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(SETTINGS_FILE);

        if !path.exists() {
            debug!("No settings found, using defaults");
            return Ok(Self::defaults_in(app_dir));
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;

        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse settings")?;

        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&app_dir()?)
    }

    /// Save settings into a specific config directory
    pub fn save_to(&self, app_dir: &Path) -> Result<()> {
        fs::create_dir_all(app_dir)
            .with_context(|| format!("Failed to create config directory {:?}", app_dir))?;

        let path = app_dir.join(SETTINGS_FILE);
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;

        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Apply environment overrides for tool locations
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os("FFMPEG_PATH").filter(|p| !p.is_empty()) {
            self.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(path) = std::env::var_os("YTDLP_PATH").filter(|p| !p.is_empty()) {
            self.ytdlp_path = PathBuf::from(path);
        }
        self
    }
}

/// The application's config directory (~/.config/tunefetch)
pub fn app_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join(APP_DIR))
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(input: &str) -> PathBuf {
    let input = input.trim();
    if input == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_quality_parsing() {
        assert_eq!("190".parse::<Quality>().unwrap(), Quality::Kbps190);
        assert_eq!(" 320 kbps".parse::<Quality>().unwrap(), Quality::Kbps320);
        assert!("128".parse::<Quality>().is_err());
        assert_eq!(Quality::default(), Quality::Kbps320);
        assert_eq!(Quality::Kbps190.to_string(), "190 kbps");
    }

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(dir.path()).unwrap();
        assert_eq!(settings.download_dir, dir.path().join("downloads"));
        assert_eq!(settings.quality, Quality::Kbps320);
        assert_eq!(settings.ytdlp_path, PathBuf::from("yt-dlp"));
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::defaults_in(dir.path());
        settings.quality = Quality::Kbps190;
        settings.download_dir = PathBuf::from("/music");
        settings.save_to(dir.path()).unwrap();

        let loaded = Settings::load_from(dir.path()).unwrap();
        assert_eq!(loaded, settings);

        let raw = fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(raw.contains("\"quality\": \"190\""));
    }

    #[test]
    fn test_missing_tool_paths_use_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "download_dir": "/tmp/music" }"#,
        )
        .unwrap();

        let loaded = Settings::load_from(dir.path()).unwrap();
        assert_eq!(loaded.ffmpeg_path, None);
        assert_eq!(loaded.quality, Quality::Kbps320);
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/srv/music"), PathBuf::from("/srv/music"));
        assert_eq!(expand_tilde("relative/dir "), PathBuf::from("relative/dir"));
    }
}
