//! tunefetch - Download your Spotify library as tagged MP3 files

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod download;
mod library;
mod spotify;
mod utils;

use cli::commands::DownloadRequest;
use cli::{Cli, Commands};
use download::CancelFlag;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "tunefetch=debug,reqwest=debug"
    } else {
        "tunefetch=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cancel = CancelFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let app = cli.app_credentials();

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Auth { force, logout } => {
            cli::commands::auth(app, force, logout).await?;
        }
        Commands::Playlists => {
            cli::commands::playlists(app).await?;
        }
        Commands::Playlist { playlist, options } => {
            cli::commands::download(app, DownloadRequest::Playlist(playlist), options, cancel).await?;
        }
        Commands::Liked { options } => {
            cli::commands::download(app, DownloadRequest::Liked, options, cancel).await?;
        }
        Commands::Top { limit, options } => {
            cli::commands::download(app, DownloadRequest::Top(limit), options, cancel).await?;
        }
        Commands::Recommend {
            playlist,
            top,
            options,
        } => {
            let request = match (playlist, top) {
                (Some(playlist), _) => DownloadRequest::RecommendFromPlaylist(playlist),
                (None, Some(seeds)) => DownloadRequest::RecommendFromTop(seeds),
                (None, None) => anyhow::bail!("Pass --playlist or --top"),
            };
            cli::commands::download(app, request, options, cancel).await?;
        }
        Commands::Config { action } => {
            cli::commands::config(action)?;
        }
        Commands::Menu => {
            cli::commands::menu(app, cancel).await?;
        }
        Commands::Completion { shell } => {
            cli::commands::completion(shell);
        }
    }

    Ok(())
}

/// First Ctrl-C stops the batch after the current track; the second exits
fn spawn_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("\nOperation cancelled by user, stopping after the current track.");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
