//! Spotify Web API response models

use serde::{Deserialize, Serialize};

/// Error body returned by the Web API on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

/// One page of a paginated listing
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Absolute URL of the next page, if any
    pub next: Option<String>,
}

/// The authenticated user
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
}

/// Artist reference as embedded in tracks and albums
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    /// Missing for local files
    pub id: Option<String>,
    pub name: String,
}

/// Full artist object, only needed for its genres
#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Album artwork reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Album as embedded in a track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    /// Widest first, as returned by the API
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Track descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub track_number: u32,
    #[serde(rename = "type", default = "default_item_type")]
    pub item_type: String,
}

fn default_item_type() -> String {
    "track".to_string()
}

impl Track {
    /// First listed artist, the one used for paths and genre lookup
    pub fn primary_artist(&self) -> Option<&ArtistRef> {
        self.artists.first()
    }

    /// Playlists can contain podcast episodes, which we never download
    pub fn is_track(&self) -> bool {
        self.item_type == "track"
    }
}

/// Entry of a playlist's item listing
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    /// Null for tracks that were removed from the catalogue
    pub track: Option<Track>,
}

/// Entry of the saved tracks listing
#[derive(Debug, Clone, Deserialize)]
pub struct SavedTrack {
    pub track: Track,
}

/// Playlist summary from the user's playlist listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tracks: PlaylistTracksRef,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlaylistTracksRef {
    #[serde(default)]
    pub total: u32,
}

/// Recommendations response
#[derive(Debug, Clone, Deserialize)]
pub struct Recommendations {
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: u64,
}
