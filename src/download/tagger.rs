//! Best-effort ID3 enrichment of downloaded files
//!
//! Nothing in here can fail a download. Every problem is folded into the
//! returned [`Enrichment`] and logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagType};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::planner::DownloadTarget;
use crate::library::MetadataSource;
use crate::spotify::Track;
use crate::utils::cover_art;

/// How far enrichment got
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    /// Tags, genre and cover art (where available) all written
    Enriched,
    /// Tags written, but some lookups failed
    Partial(Vec<String>),
    /// The file could not be tagged; it is kept as downloaded
    Failed(String),
}

/// Adds metadata to a file that has already been downloaded
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, target: &DownloadTarget, track: &Track) -> Enrichment;
}

/// Everything written into the tag
#[derive(Debug, Clone, Default)]
struct TagFields {
    artist: String,
    title: String,
    album: String,
    album_artist: Option<String>,
    track_number: Option<u32>,
    genre: Option<String>,
    cover: Option<Vec<u8>>,
}

/// ID3v2 tagger backed by lofty
pub struct LoftyTagger {
    metadata: Arc<dyn MetadataSource>,
}

impl LoftyTagger {
    pub fn new(metadata: Arc<dyn MetadataSource>) -> Self {
        Self { metadata }
    }

    async fn lookup_genre(&self, track: &Track) -> Result<Option<String>> {
        let Some(artist_id) = track.primary_artist().and_then(|a| a.id.as_deref()) else {
            return Ok(None);
        };
        let genres = self.metadata.artist_genres(artist_id).await?;
        Ok(genres.into_iter().next())
    }

    async fn fetch_cover(&self, track: &Track) -> Result<Option<Vec<u8>>> {
        let Some(image) = track.album.images.first() else {
            return Ok(None);
        };
        let data = self.metadata.fetch_artwork(&image.url).await?;
        Ok(Some(data))
    }
}

#[async_trait]
impl Enricher for LoftyTagger {
    async fn enrich(&self, target: &DownloadTarget, track: &Track) -> Enrichment {
        let mut problems = Vec::new();

        let mut fields = TagFields {
            artist: target.artist.clone(),
            title: target.title.clone(),
            album: target.album.clone(),
            album_artist: track.album.artists.first().map(|a| a.name.clone()),
            track_number: Some(track.track_number).filter(|n| *n > 0),
            ..Default::default()
        };

        match self.lookup_genre(track).await {
            Ok(genre) => fields.genre = genre,
            Err(e) => {
                warn!("Genre lookup failed for {}: {:#}", target.file_name(), e);
                problems.push(format!("genre lookup failed: {:#}", e));
            }
        }

        match self.fetch_cover(track).await {
            Ok(cover) => fields.cover = cover,
            Err(e) => {
                warn!("Cover art download failed for {}: {:#}", target.file_name(), e);
                problems.push(format!("cover art download failed: {:#}", e));
            }
        }

        let path = target.file_path.clone();
        let written = tokio::task::spawn_blocking(move || write_tags(&path, fields))
            .await
            .context("Tagging task panicked")
            .and_then(|result| result);

        match written {
            Ok(()) if problems.is_empty() => Enrichment::Enriched,
            Ok(()) => Enrichment::Partial(problems),
            Err(e) => {
                warn!("Failed to add metadata to {}: {:#}", target.file_name(), e);
                Enrichment::Failed(format!("{:#}", e))
            }
        }
    }
}

/// Load (or create) the ID3v2 tag, fill it in and save it back
fn write_tags(path: &Path, fields: TagFields) -> Result<()> {
    let mut tagged_file = Probe::open(path)
        .context("Failed to open audio file")?
        .read()
        .context("Failed to read audio file tags")?;

    if tagged_file.tag(TagType::Id3v2).is_none() {
        tagged_file.insert_tag(Tag::new(TagType::Id3v2));
    }
    let tag = tagged_file
        .tag_mut(TagType::Id3v2)
        .context("Failed to create ID3v2 tag")?;

    tag.set_artist(fields.artist);
    tag.set_title(fields.title);
    tag.set_album(fields.album);
    if let Some(album_artist) = fields.album_artist {
        tag.insert_text(ItemKey::AlbumArtist, album_artist);
    }
    if let Some(number) = fields.track_number {
        tag.set_track(number);
    }
    if let Some(genre) = fields.genre {
        tag.set_genre(genre);
    }
    if let Some(cover) = fields.cover {
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            Some(MimeType::Jpeg),
            None,
            normalise_cover(cover),
        ));
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .context("Failed to save tags")?;

    debug!("Tagged: {}", path.display());
    Ok(())
}

/// Re-encode as JPEG; keep the original bytes if the image will not decode
fn normalise_cover(data: Vec<u8>) -> Vec<u8> {
    match cover_art::front_cover_jpeg(&data) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            debug!("Embedding cover art unprocessed: {:#}", e);
            data
        }
    }
}

#[cfg(test)]
pub mod stub {
    //! Enrichers and metadata sources for pipeline tests

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Enricher that always fails, counting its calls
    #[derive(Default)]
    pub struct FailingEnricher {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl Enricher for FailingEnricher {
        async fn enrich(&self, _target: &DownloadTarget, _track: &Track) -> Enrichment {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Enrichment::Failed("tag backend exploded".to_string())
        }
    }

    /// Enricher that does nothing and reports success
    pub struct NoopEnricher;

    #[async_trait]
    impl Enricher for NoopEnricher {
        async fn enrich(&self, _target: &DownloadTarget, _track: &Track) -> Enrichment {
            Enrichment::Enriched
        }
    }

    /// Canned metadata lookups
    pub struct MetadataStub {
        pub genres: Result<Vec<String>, String>,
        pub artwork: Result<Vec<u8>, String>,
    }

    #[async_trait]
    impl MetadataSource for MetadataStub {
        async fn artist_genres(&self, _artist_id: &str) -> Result<Vec<String>> {
            self.genres.clone().map_err(anyhow::Error::msg)
        }

        async fn fetch_artwork(&self, _url: &str) -> Result<Vec<u8>> {
            self.artwork.clone().map_err(anyhow::Error::msg)
        }
    }
}
