//! Sequential batch downloads with per-track status and a final tally

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use super::orchestrator::{TrackDownloader, TrackOutcome};
use super::planner::component_or;
use super::tagger::Enrichment;
use crate::config::Quality;
use crate::spotify::Track;

/// Shared stop request, checked between tracks
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Tracks that were started
    pub attempted: usize,
    /// Tracks that ended up on disk, new or already present
    pub succeeded: usize,
    /// One outcome per attempted track, in order
    pub outcomes: Vec<TrackOutcome>,
    /// Stopped before the end of the sequence
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    /// Downloaded files that could not be tagged
    pub fn untagged(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_untagged()).count()
    }
}

/// Progress bar styled like the rest of the CLI
pub fn progress_bar(len: usize) -> ProgressBar {
    let progress = ProgressBar::new(len as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    progress
}

/// Runs a [`TrackDownloader`] over an ordered list of tracks
pub struct BatchDownloader {
    downloader: TrackDownloader,
    download_root: PathBuf,
}

impl BatchDownloader {
    pub fn new(downloader: TrackDownloader, download_root: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            download_root: download_root.into(),
        }
    }

    /// Directory a collection is downloaded into
    pub fn batch_root(&self, collection_name: &str) -> PathBuf {
        self.download_root
            .join(component_or(collection_name, "Untitled"))
    }

    /// Download every track in order, one at a time
    ///
    /// Per-track failures never stop the batch; only cancellation does.
    pub async fn run(
        &self,
        tracks: &[Track],
        collection_name: &str,
        quality: Quality,
        progress: &ProgressBar,
        cancel: &CancelFlag,
    ) -> Result<BatchSummary> {
        let batch_root = self.batch_root(collection_name);
        tokio::fs::create_dir_all(&batch_root)
            .await
            .with_context(|| format!("Failed to create download folder {}", batch_root.display()))?;

        info!(
            "Downloading {} tracks into {} at {}",
            tracks.len(),
            batch_root.display(),
            quality
        );

        let mut summary = BatchSummary::default();

        for track in tracks {
            if cancel.is_cancelled() {
                warn!("Batch cancelled after {} tracks", summary.attempted);
                summary.cancelled = true;
                break;
            }

            let name = TrackDownloader::plan(track, &batch_root).file_name();
            progress.set_message(name.clone());

            let outcome = self
                .downloader
                .download_track(track, &batch_root, quality)
                .await;

            progress.println(status_line(&name, &outcome));
            progress.inc(1);

            summary.attempted += 1;
            if outcome.is_success() {
                summary.succeeded += 1;
            }
            summary.outcomes.push(outcome);
        }

        progress.finish_and_clear();
        info!(
            "Batch finished: {}/{} succeeded",
            summary.succeeded, summary.attempted
        );
        Ok(summary)
    }
}

/// One line describing how a track ended
fn status_line(name: &str, outcome: &TrackOutcome) -> String {
    match outcome {
        TrackOutcome::AlreadyPresent => format!("{} {} (already downloaded)", "=".dimmed(), name),
        TrackOutcome::Downloaded(Enrichment::Enriched) => format!("{} {}", "✓".green(), name),
        TrackOutcome::Downloaded(Enrichment::Partial(problems)) => format!(
            "{} {} {}",
            "✓".green(),
            name,
            format!("(partial tags: {})", problems.join("; ")).yellow()
        ),
        TrackOutcome::Downloaded(Enrichment::Failed(reason)) => format!(
            "{} {} {}",
            "✓".green(),
            name,
            format!("(untagged: {})", reason).yellow()
        ),
        TrackOutcome::PlanFailed(reason) | TrackOutcome::ResolutionFailed(reason) => {
            format!("{} {} {}", "✗".red(), name, reason.red())
        }
        TrackOutcome::VerificationFailed => {
            format!("{} {} {}", "✗".red(), name, "download not produced".red())
        }
    }
}

/// Final tally for the terminal
pub fn summary_line(summary: &BatchSummary, batch_root: &Path) -> String {
    let tally = format!("{}/{}", summary.succeeded, summary.attempted);
    let tally = if summary.failed() == 0 {
        tally.green().bold()
    } else {
        tally.yellow().bold()
    };

    let mut line = format!(
        "Downloaded {} tracks to {}",
        tally,
        batch_root.display()
    );
    let untagged = summary.untagged();
    if untagged > 0 {
        line.push_str(&format!(" {}", format!("({} untagged)", untagged).yellow()));
    }
    if summary.cancelled {
        line.push_str(&format!(" {}", "(cancelled)".yellow()));
    }
    line
}
