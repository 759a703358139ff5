//! CLI module for tunefetch

use clap::{Args, Parser, Subcommand};

use crate::config::Quality;

pub mod auth;
pub mod commands;

pub use auth::{AppCredentials, AuthManager};

#[derive(Parser, Debug)]
#[command(name = "tunefetch", about = "Download your Spotify library as tagged MP3 files")]
#[command(version, author)]
pub struct Cli {
    /// Command to run; the interactive menu when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Spotify app client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID", global = true, hide_env_values = true)]
    pub client_id: Option<String>,

    /// Spotify app client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,
}

impl Cli {
    pub fn app_credentials(&self) -> Option<AppCredentials> {
        AppCredentials::from_parts(self.client_id.clone(), self.client_secret.clone())
    }
}

/// One-shot overrides shared by every download command
#[derive(Args, Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Bitrate for this run (overrides the saved setting)
    #[arg(short, long, value_enum)]
    pub quality: Option<Quality>,

    /// Download root for this run (overrides the saved setting)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to Spotify and store the access token
    Auth {
        /// Force re-authentication (ignore the stored token)
        #[arg(long, conflicts_with = "logout")]
        force: bool,

        /// Delete the stored token
        #[arg(long)]
        logout: bool,
    },

    /// List your playlists with their track counts
    Playlists,

    /// Download a playlist
    Playlist {
        /// Number from `playlists`, or a playlist id
        #[arg(value_name = "NUMBER|ID")]
        playlist: String,

        #[command(flatten)]
        options: DownloadOptions,
    },

    /// Download your liked songs
    Liked {
        #[command(flatten)]
        options: DownloadOptions,
    },

    /// Download your top tracks
    Top {
        /// How many top tracks (1-50)
        #[arg(short, long, default_value = "20")]
        limit: u32,

        #[command(flatten)]
        options: DownloadOptions,
    },

    /// Download recommendations seeded by a playlist or your top tracks
    #[command(group(
        clap::ArgGroup::new("seed").required(true).args(["playlist", "top"])
    ))]
    Recommend {
        /// Seed from a playlist (number from `playlists`, or id)
        #[arg(long, value_name = "NUMBER|ID")]
        playlist: Option<String>,

        /// Seed from this many top tracks (1-5)
        #[arg(long, value_name = "N")]
        top: Option<u32>,

        #[command(flatten)]
        options: DownloadOptions,
    },

    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Interactive menu
    Menu,

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the current settings
    Show,

    /// Set the default bitrate
    SetQuality {
        #[arg(value_enum)]
        quality: Quality,
    },

    /// Set the default download directory
    SetDir {
        /// New directory (`~` is expanded)
        path: String,
    },
}
