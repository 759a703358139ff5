//! CLI command handlers

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::generate;
use colored::Colorize;
use dialoguer::{Input, Select};
use std::io;
use std::sync::Arc;

use super::{AppCredentials, AuthManager, Cli, ConfigAction, DownloadOptions};
use crate::config::{self, Quality, Settings};
use crate::download::{
    progress_bar, summary_line, BatchDownloader, BatchSummary, CancelFlag, LoftyTagger,
    TrackDownloader, YtDlp,
};
use crate::library::{Collection, LibrarySource, MAX_SEEDS, MAX_TOP_TRACKS};
use crate::spotify::{Playlist, SpotifyClient};

/// Handle the `auth` command
pub async fn auth(app: Option<AppCredentials>, force: bool, logout: bool) -> Result<()> {
    let manager = AuthManager::new()?;

    if logout {
        if manager.logout()? {
            println!("{}", "Logged out, stored token deleted.".green());
        } else {
            println!("{}", "No stored token found.".yellow());
        }
        return Ok(());
    }

    println!("{}", "Connecting to Spotify...".cyan());
    let client = manager.authenticate(app.as_ref(), force).await?;
    let user = client.current_user().await?;

    println!();
    println!("{}", "Authentication successful!".green().bold());
    println!("  User: {}", user.display_name.as_deref().unwrap_or(&user.id));
    Ok(())
}

/// Handle the `playlists` command
pub async fn playlists(app: Option<AppCredentials>) -> Result<()> {
    let client = connect(app.as_ref()).await?;
    let playlists = client.playlists().await?;

    if playlists.is_empty() {
        println!("{}", "No playlists found.".yellow());
        return Ok(());
    }

    println!("{}", "Your playlists:".green().bold());
    for (i, playlist) in playlists.iter().enumerate() {
        println!("{}. {} ({} tracks)", i + 1, playlist.name, playlist.tracks.total);
    }
    Ok(())
}

/// Handle `playlist`, `liked`, `top` and `recommend`
pub async fn download(
    app: Option<AppCredentials>,
    request: DownloadRequest,
    options: DownloadOptions,
    cancel: CancelFlag,
) -> Result<()> {
    let client = connect(app.as_ref()).await?;
    let settings = Settings::load()?.with_env_overrides();

    let collection = match request {
        DownloadRequest::Playlist(selector) => {
            let playlist = find_playlist(&client, &selector).await?;
            Collection::Playlist {
                id: playlist.id,
                name: playlist.name,
            }
        }
        DownloadRequest::Liked => Collection::LikedSongs,
        DownloadRequest::Top(limit) => Collection::top_tracks(limit),
        DownloadRequest::RecommendFromPlaylist(selector) => {
            let playlist = find_playlist(&client, &selector).await?;
            Collection::PlaylistRecommendations {
                id: playlist.id,
                name: playlist.name,
            }
        }
        DownloadRequest::RecommendFromTop(seeds) => Collection::top_track_recommendations(seeds),
    };

    download_collection(&client, &collection, &settings, &options, &cancel).await?;
    Ok(())
}

/// What a download command asked for, before playlists are looked up
#[derive(Debug, Clone)]
pub enum DownloadRequest {
    Playlist(String),
    Liked,
    Top(u32),
    RecommendFromPlaylist(String),
    RecommendFromTop(u32),
}

/// Handle the `config` command
pub fn config(action: ConfigAction) -> Result<()> {
    let mut settings = Settings::load()?;

    match action {
        ConfigAction::Show => {
            let settings = settings.with_env_overrides();
            println!("{}", "Settings:".green().bold());
            println!("  Download directory: {}", settings.download_dir.display());
            println!("  Quality:            {}", settings.quality);
            println!("  yt-dlp:             {}", settings.ytdlp_path.display());
            println!(
                "  ffmpeg:             {}",
                settings
                    .ffmpeg_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(from PATH)".to_string())
            );
            println!();
            println!("Stored in {}", config::app_dir()?.display());
        }
        ConfigAction::SetQuality { quality } => {
            set_quality(&mut settings, quality)?;
        }
        ConfigAction::SetDir { path } => {
            set_download_dir(&mut settings, &path)?;
        }
    }

    Ok(())
}

/// Handle the `menu` command
pub async fn menu(app: Option<AppCredentials>, cancel: CancelFlag) -> Result<()> {
    let client = connect(app.as_ref()).await?;
    let mut settings = Settings::load()?.with_env_overrides();

    let user = client.current_user().await?;
    println!(
        "Logged in as: {}",
        user.display_name.as_deref().unwrap_or(&user.id).green()
    );
    println!("Download directory: {}", settings.download_dir.display());

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let items = [
            "Download a playlist".to_string(),
            "Download liked songs".to_string(),
            "Download top tracks".to_string(),
            "Download recommendations based on a playlist".to_string(),
            "Download recommendations based on top tracks".to_string(),
            format!("Set download quality (current: {})", settings.quality),
            format!(
                "Change download directory (current: {})",
                settings.download_dir.display()
            ),
            "Exit".to_string(),
        ];

        println!();
        let choice = Select::new()
            .with_prompt("Spotify Downloader Menu")
            .items(&items)
            .default(0)
            .interact()
            .context("Failed to read menu choice")?;

        let collection = match choice {
            0 | 3 => {
                let Some(playlist) = pick_playlist(&client).await? else {
                    continue;
                };
                if choice == 0 {
                    Collection::Playlist {
                        id: playlist.id,
                        name: playlist.name,
                    }
                } else {
                    Collection::PlaylistRecommendations {
                        id: playlist.id,
                        name: playlist.name,
                    }
                }
            }
            1 => Collection::LikedSongs,
            2 => Collection::top_tracks(prompt_count("How many top tracks?", MAX_TOP_TRACKS)?),
            4 => Collection::top_track_recommendations(prompt_count(
                "How many top tracks to base recommendations on?",
                MAX_SEEDS as u32,
            )?),
            5 => {
                let qualities = [Quality::Kbps190, Quality::Kbps320];
                let selected = Select::new()
                    .with_prompt("Quality")
                    .items(&qualities)
                    .default(qualities.iter().position(|q| *q == settings.quality).unwrap_or(1))
                    .interact()
                    .context("Failed to read quality")?;
                set_quality(&mut settings, qualities[selected])?;
                continue;
            }
            6 => {
                let path: String = Input::new()
                    .with_prompt("New download directory")
                    .with_initial_text(settings.download_dir.display().to_string())
                    .interact_text()
                    .context("Failed to read directory")?;
                set_download_dir(&mut settings, &path)?;
                continue;
            }
            _ => {
                println!("Goodbye!");
                break;
            }
        };

        let summary = download_collection(
            &client,
            &collection,
            &settings,
            &DownloadOptions::default(),
            &cancel,
        )
        .await;

        // A failed fetch should not end the session
        match summary {
            Ok(summary) if summary.cancelled => break,
            Ok(_) => {}
            Err(e) => println!("{} {:#}", "Error:".red().bold(), e),
        }
    }

    Ok(())
}

/// Handle the `completion` command
pub fn completion(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "tunefetch", &mut io::stdout());
}

/// Authenticated client, running the login flow if needed
async fn connect(app: Option<&AppCredentials>) -> Result<Arc<SpotifyClient>> {
    let client = AuthManager::new()?.authenticate(app, false).await?;
    Ok(Arc::new(client))
}

/// Fetch a collection and download it into the configured root
async fn download_collection(
    client: &Arc<SpotifyClient>,
    collection: &Collection,
    settings: &Settings,
    options: &DownloadOptions,
    cancel: &CancelFlag,
) -> Result<BatchSummary> {
    let quality = options.quality.unwrap_or(settings.quality);
    let root = options
        .dir
        .as_deref()
        .map(config::expand_tilde)
        .unwrap_or_else(|| settings.download_dir.clone());

    let ytdlp = YtDlp::new(&settings.ytdlp_path, settings.ffmpeg_path.clone());
    let version = ytdlp.check_available().await.with_context(|| {
        format!(
            "yt-dlp is required; install it or set YTDLP_PATH (tried {})",
            settings.ytdlp_path.display()
        )
    })?;
    tracing::debug!("Using yt-dlp {}", version);

    println!("{}", format!("Getting {}...", collection.display_name()).cyan());
    let tracks = client.fetch_collection(collection).await?;

    if tracks.is_empty() {
        println!("{}", "No tracks found.".yellow());
        return Ok(BatchSummary::default());
    }

    let tagger = LoftyTagger::new(client.clone());
    let batch = BatchDownloader::new(
        TrackDownloader::new(Arc::new(ytdlp), Arc::new(tagger)),
        root,
    );
    let name = collection.display_name();
    let batch_root = batch.batch_root(&name);

    println!();
    println!(
        "Downloading {} tracks to: {} ({})",
        tracks.len(),
        batch_root.display().to_string().green(),
        quality
    );

    let progress = progress_bar(tracks.len());
    let summary = batch.run(&tracks, &name, quality, &progress, cancel).await?;

    println!();
    println!("{}", summary_line(&summary, &batch_root));
    Ok(summary)
}

/// Resolve a 1-based playlist number or a playlist id
async fn find_playlist(client: &SpotifyClient, selector: &str) -> Result<Playlist> {
    let playlists = client.playlists().await?;
    select_playlist(playlists, selector)
}

fn select_playlist(playlists: Vec<Playlist>, selector: &str) -> Result<Playlist> {
    let selector = selector.trim();

    if let Ok(number) = selector.parse::<usize>() {
        let count = playlists.len();
        return number
            .checked_sub(1)
            .and_then(|idx| playlists.into_iter().nth(idx))
            .with_context(|| format!("Invalid selection {}; you have {} playlists", number, count));
    }

    match playlists.into_iter().find(|p| p.id == selector) {
        Some(playlist) => Ok(playlist),
        None => Ok(Playlist {
            id: selector.to_string(),
            name: selector.to_string(),
            tracks: Default::default(),
        }),
    }
}

/// Let the user choose one of their playlists
async fn pick_playlist(client: &SpotifyClient) -> Result<Option<Playlist>> {
    let playlists = client.playlists().await?;
    if playlists.is_empty() {
        println!("{}", "No playlists found.".yellow());
        return Ok(None);
    }

    let labels: Vec<String> = playlists
        .iter()
        .map(|p| format!("{} ({} tracks)", p.name, p.tracks.total))
        .collect();

    let selected = Select::new()
        .with_prompt("Select playlist")
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to read playlist choice")?;

    Ok(playlists.into_iter().nth(selected))
}

fn prompt_count(prompt: &str, max: u32) -> Result<u32> {
    Input::<u32>::new()
        .with_prompt(format!("{} (1-{})", prompt, max))
        .validate_with(move |n: &u32| -> Result<(), String> {
            if (1..=max).contains(n) {
                Ok(())
            } else {
                Err(format!("Please enter a number between 1 and {}", max))
            }
        })
        .interact_text()
        .context("Failed to read number")
}

fn set_quality(settings: &mut Settings, quality: Quality) -> Result<()> {
    settings.quality = quality;
    settings.save()?;
    println!("Quality set to {}", quality.to_string().green());
    Ok(())
}

fn set_download_dir(settings: &mut Settings, path: &str) -> Result<()> {
    let dir = config::expand_tilde(path);
    if dir.as_os_str().is_empty() {
        println!("{}", "Download directory unchanged.".yellow());
        return Ok(());
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    settings.download_dir = dir;
    settings.save()?;
    println!(
        "Download directory changed to {}",
        settings.download_dir.display().to_string().green()
    );
    Ok(())
}
