//! Per-track download: plan, skip, resolve, verify, tag, clean up

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::planner::DownloadTarget;
use super::resolver::{build_query, MediaResolver, Resolution};
use super::tagger::{Enricher, Enrichment};
use crate::config::Quality;
use crate::spotify::Track;

/// Terminal state of one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The target file was already on disk; nothing was downloaded
    AlreadyPresent,
    /// Downloaded and verified; tagging may still have failed
    Downloaded(Enrichment),
    /// The album directory could not be created
    PlanFailed(String),
    /// No search match, or the resolver itself failed
    ResolutionFailed(String),
    /// The resolver reported success but the expected file is missing
    VerificationFailed,
}

impl TrackOutcome {
    /// Whether the track counts towards the batch's success tally
    pub fn is_success(&self) -> bool {
        matches!(self, Self::AlreadyPresent | Self::Downloaded(_))
    }

    /// Downloaded, but the tags could not be written
    pub fn is_untagged(&self) -> bool {
        matches!(self, Self::Downloaded(Enrichment::Failed(_)))
    }
}

/// Downloads single tracks into a batch directory
pub struct TrackDownloader {
    resolver: Arc<dyn MediaResolver>,
    enricher: Arc<dyn Enricher>,
}

impl TrackDownloader {
    pub fn new(resolver: Arc<dyn MediaResolver>, enricher: Arc<dyn Enricher>) -> Self {
        Self { resolver, enricher }
    }

    /// Where a track would be stored under `batch_root`
    pub fn plan(track: &Track, batch_root: &Path) -> DownloadTarget {
        let artist = track.primary_artist().map(|a| a.name.as_str()).unwrap_or("");
        DownloadTarget::new(batch_root, artist, &track.album.name, &track.name)
    }

    /// Download one track
    ///
    /// Never returns an error: every failure is a [`TrackOutcome`]. When this
    /// returns, the target path is either absent or a complete download.
    pub async fn download_track(
        &self,
        track: &Track,
        batch_root: &Path,
        quality: Quality,
    ) -> TrackOutcome {
        let target = Self::plan(track, batch_root);

        if let Err(e) = target.prepare().await {
            return TrackOutcome::PlanFailed(format!("{:#}", e));
        }

        if target.file_path.exists() {
            debug!("Already exists: {}", target.file_path.display());
            return TrackOutcome::AlreadyPresent;
        }

        info!("Downloading: {}", target.file_name());

        let query = build_query(&target.artist, &target.title);
        let resolution = self
            .resolver
            .resolve(&query, quality, &target.output_template())
            .await;

        let produced = match resolution {
            Ok(Resolution::NoMatch) => {
                warn!("No results found for: {}", query);
                remove_partial(&target.file_path).await;
                return TrackOutcome::ResolutionFailed(format!("no results for \"{}\"", query));
            }
            Ok(Resolution::Downloaded { produced_path }) => {
                produced_path.filter(|p| *p != target.file_path)
            }
            Err(e) => {
                warn!("Error downloading {}: {}", target.file_name(), e);
                remove_partial(&target.file_path).await;
                return TrackOutcome::ResolutionFailed(e.to_string());
            }
        };

        // The resolver's own report is not trusted; only the exact path counts
        if !target.file_path.exists() {
            warn!("Download failed: {} was not produced", target.file_name());
            remove_partial(&target.file_path).await;
            if let Some(stray) = produced.filter(|p| p.starts_with(&target.album_dir)) {
                remove_partial(&stray).await;
            }
            return TrackOutcome::VerificationFailed;
        }

        if let Some(produced) = produced {
            debug!("Resolver reported {}", produced.display());
        }

        let enrichment = self.enricher.enrich(&target, track).await;
        TrackOutcome::Downloaded(enrichment)
    }
}

/// Delete a possibly incomplete download, ignoring errors
async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial download {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!("Could not remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::resolver::stub::{ResolverStub, Script};
    use crate::download::tagger::stub::{FailingEnricher, NoopEnricher};
    use crate::spotify::{Album, ArtistRef};
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn track(artist: &str, album: &str, title: &str) -> Track {
        Track {
            id: Some(format!("id-{}", title)),
            name: title.to_string(),
            artists: vec![ArtistRef {
                id: Some(format!("artist-{}", artist)),
                name: artist.to_string(),
            }],
            album: Album {
                id: None,
                name: album.to_string(),
                artists: vec![],
                images: vec![],
            },
            track_number: 1,
            item_type: "track".to_string(),
        }
    }

    fn downloader(resolver: Arc<ResolverStub>) -> TrackDownloader {
        TrackDownloader::new(resolver, Arc::new(NoopEnricher))
    }

    #[tokio::test]
    async fn test_success_writes_expected_path() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(ResolverStub::new());
        let track = track("AC/DC", "High Voltage", "T.N.T.");

        let outcome = downloader(resolver.clone())
            .download_track(&track, dir.path(), Quality::Kbps320)
            .await;

        assert_eq!(outcome, TrackOutcome::Downloaded(Enrichment::Enriched));
        assert!(dir.path().join("ACDC/High Voltage/ACDC - T.N.T..mp3").is_file());
        assert_eq!(resolver.calls(), vec!["ACDC T.N.T. official audio"]);
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded_again() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(ResolverStub::new());
        let track = track("Artist", "Album", "Song");
        let target = TrackDownloader::plan(&track, dir.path());
        target.prepare().await.unwrap();
        std::fs::write(&target.file_path, b"done earlier").unwrap();

        let outcome = downloader(resolver.clone())
            .download_track(&track, dir.path(), Quality::Kbps320)
            .await;

        assert_eq!(outcome, TrackOutcome::AlreadyPresent);
        assert!(resolver.calls().is_empty());
        assert_eq!(std::fs::read(&target.file_path).unwrap(), b"done earlier");
    }

    #[tokio::test]
    async fn test_no_match_fails_without_file() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(ResolverStub::new());
        resolver.script("Obscure", Script::NoMatch);
        let track = track("Artist", "Album", "Obscure");

        let outcome = downloader(resolver)
            .download_track(&track, dir.path(), Quality::Kbps320)
            .await;

        assert!(matches!(outcome, TrackOutcome::ResolutionFailed(_)));
        assert!(!outcome.is_success());
        assert!(!TrackDownloader::plan(&track, dir.path()).file_path.exists());
    }

    #[tokio::test]
    async fn test_partial_file_removed_after_resolver_error() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(ResolverStub::new());
        resolver.script("Crash", Script::FailAfterPartialWrite);
        let track = track("Artist", "Album", "Crash");

        let outcome = downloader(resolver.clone())
            .download_track(&track, dir.path(), Quality::Kbps320)
            .await;

        assert!(matches!(outcome, TrackOutcome::ResolutionFailed(ref msg) if msg.contains("conversion failed")));
        assert!(!TrackDownloader::plan(&track, dir.path()).file_path.exists());

        // A rerun must not mistake the failed attempt for a finished download
        let rerun = downloader(resolver.clone())
            .download_track(&track, dir.path(), Quality::Kbps320)
            .await;
        assert!(matches!(rerun, TrackOutcome::ResolutionFailed(_)));
        assert_eq!(resolver.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_wrong_filename_fails_verification() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(ResolverStub::new());
        resolver.script("Video", Script::WrongExtension);
        let track = track("Artist", "Album", "Video");

        let outcome = downloader(resolver)
            .download_track(&track, dir.path(), Quality::Kbps320)
            .await;

        let target = TrackDownloader::plan(&track, dir.path());
        assert_eq!(outcome, TrackOutcome::VerificationFailed);
        assert!(!target.file_path.exists());
        assert!(!target.album_dir.join("Artist - Video.webm").exists());
    }

    #[tokio::test]
    async fn test_reported_file_outside_album_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let elsewhere = dir.path().join("notes.txt");
        std::fs::write(&elsewhere, b"keep me").unwrap();
        let resolver = Arc::new(ResolverStub::new());
        resolver.script("Video", Script::ReportOnly(elsewhere.clone()));
        let track = track("Artist", "Album", "Video");

        let outcome = downloader(resolver)
            .download_track(&track, dir.path(), Quality::Kbps320)
            .await;

        assert_eq!(outcome, TrackOutcome::VerificationFailed);
        assert!(elsewhere.is_file());
    }

    #[tokio::test]
    async fn test_tagging_failure_keeps_download() {
        let dir = TempDir::new().unwrap();
        let enricher = Arc::new(FailingEnricher::default());
        let downloader = TrackDownloader::new(Arc::new(ResolverStub::new()), enricher.clone());
        let track = track("Artist", "Album", "Song");

        let outcome = downloader
            .download_track(&track, dir.path(), Quality::Kbps190)
            .await;

        assert!(outcome.is_success());
        assert!(outcome.is_untagged());
        assert!(TrackDownloader::plan(&track, dir.path()).file_path.is_file());
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_plan_failure_is_an_outcome() {
        let dir = TempDir::new().unwrap();
        // A regular file where the artist directory should go
        std::fs::write(dir.path().join("Artist"), b"in the way").unwrap();
        let track = track("Artist", "Album", "Song");

        let outcome = downloader(Arc::new(ResolverStub::new()))
            .download_track(&track, dir.path(), Quality::Kbps320)
            .await;

        assert!(matches!(outcome, TrackOutcome::PlanFailed(_)));
    }

    #[test]
    fn test_plan_uses_first_artist() {
        let mut t = track("First", "Album", "Song");
        t.artists.push(ArtistRef {
            id: None,
            name: "Second".into(),
        });
        let target = TrackDownloader::plan(&t, Path::new("/m"));
        assert_eq!(target.file_name(), "First - Song.mp3");
    }
}
