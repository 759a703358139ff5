//! Library sources: where batches of tracks come from
//!
//! The download pipeline only sees the two traits in this module. The Spotify
//! client implements both; tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::spotify::{SpotifyClient, Track};

/// Most top tracks the API hands out in one request
pub const MAX_TOP_TRACKS: u32 = 50;

/// Most seed tracks a recommendation request accepts
pub const MAX_SEEDS: usize = 5;

/// Number of recommendations requested per batch
pub const RECOMMENDATION_COUNT: u32 = 20;

/// A named, ordered group of tracks to download
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    /// Tracks of one of the user's playlists
    Playlist { id: String, name: String },
    /// The user's saved tracks
    LikedSongs,
    /// The user's top tracks
    TopTracks { limit: u32 },
    /// Recommendations seeded by the first tracks of a playlist
    PlaylistRecommendations { id: String, name: String },
    /// Recommendations seeded by the user's top tracks
    TopTrackRecommendations { seeds: u32 },
}

impl Collection {
    /// Top tracks, with the count clamped to what the API allows
    pub fn top_tracks(limit: u32) -> Self {
        Self::TopTracks {
            limit: limit.clamp(1, MAX_TOP_TRACKS),
        }
    }

    /// Recommendations from top tracks, with the seed count clamped
    pub fn top_track_recommendations(seeds: u32) -> Self {
        Self::TopTrackRecommendations {
            seeds: seeds.clamp(1, MAX_SEEDS as u32),
        }
    }

    /// Name of the batch directory for this collection
    pub fn display_name(&self) -> String {
        match self {
            Self::Playlist { name, .. } => name.clone(),
            Self::LikedSongs => "Liked Songs".to_string(),
            Self::TopTracks { .. } => "Top Tracks".to_string(),
            Self::PlaylistRecommendations { name, .. } => format!("Recommendations for {}", name),
            Self::TopTrackRecommendations { .. } => "Recommendations from Top Tracks".to_string(),
        }
    }
}

/// Supplies the tracks of a collection, pagination included
#[async_trait]
pub trait LibrarySource: Send + Sync {
    async fn fetch_collection(&self, collection: &Collection) -> Result<Vec<Track>>;
}

/// Lookups used to enrich downloaded files
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Genres of an artist, most relevant first
    async fn artist_genres(&self, artist_id: &str) -> Result<Vec<String>>;

    /// Raw bytes of an artwork image
    async fn fetch_artwork(&self, url: &str) -> Result<Vec<u8>>;
}

/// Ids of the first tracks, used as recommendation seeds
pub fn seed_ids(tracks: &[Track]) -> Vec<String> {
    tracks
        .iter()
        .filter_map(|track| track.id.clone())
        .take(MAX_SEEDS)
        .collect()
}

#[async_trait]
impl LibrarySource for SpotifyClient {
    async fn fetch_collection(&self, collection: &Collection) -> Result<Vec<Track>> {
        info!("Fetching {}", collection.display_name());

        let tracks = match collection {
            Collection::Playlist { id, .. } => self.playlist_tracks(id).await?,
            Collection::LikedSongs => self.saved_tracks().await?,
            Collection::TopTracks { limit } => self.top_tracks(*limit).await?,
            Collection::PlaylistRecommendations { id, .. } => {
                let seeds = seed_ids(&self.playlist_tracks(id).await?);
                self.recommendations(&seeds, RECOMMENDATION_COUNT).await?
            }
            Collection::TopTrackRecommendations { seeds } => {
                let seeds = seed_ids(&self.top_tracks(*seeds).await?);
                self.recommendations(&seeds, RECOMMENDATION_COUNT).await?
            }
        };

        debug!("{} yielded {} tracks", collection.display_name(), tracks.len());
        Ok(tracks)
    }
}

#[async_trait]
impl MetadataSource for SpotifyClient {
    async fn artist_genres(&self, artist_id: &str) -> Result<Vec<String>> {
        Ok(self.artist(artist_id).await?.genres)
    }

    async fn fetch_artwork(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.fetch_image(url).await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotify::Album;

    fn track(id: Option<&str>) -> Track {
        Track {
            id: id.map(str::to_string),
            name: "Song".to_string(),
            artists: vec![],
            album: Album::default(),
            track_number: 1,
            item_type: "track".to_string(),
        }
    }

    #[test]
    fn test_display_names() {
        let playlist = Collection::Playlist {
            id: "p".into(),
            name: "Road Trip".into(),
        };
        assert_eq!(playlist.display_name(), "Road Trip");
        assert_eq!(Collection::LikedSongs.display_name(), "Liked Songs");
        assert_eq!(Collection::top_tracks(10).display_name(), "Top Tracks");
        assert_eq!(
            Collection::PlaylistRecommendations {
                id: "p".into(),
                name: "Road Trip".into()
            }
            .display_name(),
            "Recommendations for Road Trip"
        );
        assert_eq!(
            Collection::top_track_recommendations(3).display_name(),
            "Recommendations from Top Tracks"
        );
    }

    #[test]
    fn test_limits_are_clamped() {
        assert_eq!(Collection::top_tracks(0), Collection::TopTracks { limit: 1 });
        assert_eq!(Collection::top_tracks(500), Collection::TopTracks { limit: 50 });
        assert_eq!(
            Collection::top_track_recommendations(9),
            Collection::TopTrackRecommendations { seeds: 5 }
        );
    }

    #[test]
    fn test_seed_ids_skip_local_tracks_and_cap_at_five() {
        let tracks = vec![
            track(Some("1")),
            track(None),
            track(Some("2")),
            track(Some("3")),
            track(Some("4")),
            track(Some("5")),
            track(Some("6")),
        ];
        assert_eq!(seed_ids(&tracks), vec!["1", "2", "3", "4", "5"]);
    }
}
