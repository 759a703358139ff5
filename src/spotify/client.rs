//! Spotify Web API HTTP client

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::models::*;

const API_BASE: &str = "https://api.spotify.com/v1";

/// Page sizes are the maximum each endpoint accepts
const PLAYLISTS_PAGE: u32 = 50;
const PLAYLIST_ITEMS_PAGE: u32 = 100;
const SAVED_TRACKS_PAGE: u32 = 50;

/// Returned (inside `anyhow::Error`) when the API rejects the access token
#[derive(Debug, thiserror::Error)]
#[error("Spotify rejected the access token (expired or revoked)")]
pub struct Unauthorized;

/// HTTP client for the Spotify Web API
#[derive(Clone)]
pub struct SpotifyClient {
    base_url: String,
    access_token: String,
    http_client: Client,
}

impl SpotifyClient {
    /// Create a new client authenticated with a bearer token
    pub fn new(access_token: &str) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("tunefetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: API_BASE.to_string(),
            access_token: access_token.to_string(),
            http_client,
        })
    }

    /// Build an absolute API URL for an endpoint path
    fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// GET a URL with the bearer token and decode the JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to reach Spotify ({})", url))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Unauthorized.into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => anyhow::bail!("Spotify error {}: {}", err.error.status, err.error.message),
                Err(_) => anyhow::bail!("Spotify request failed with status {}", status),
            }
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// Follow `next` links until the listing is exhausted
    async fn collect_pages<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            let page: Paging<T> = self.get_json(&url).await?;
            items.extend(page.items);
            next = page.next;
        }

        Ok(items)
    }

    /// Get the current user, also used to check the token is valid
    pub async fn current_user(&self) -> Result<User> {
        self.get_json(&self.build_url("me")).await
    }

    /// Get all playlists of the current user
    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        let url = self.build_url(&format!("me/playlists?limit={}", PLAYLISTS_PAGE));
        let playlists: Vec<Playlist> = self.collect_pages(url).await?;
        debug!("Found {} playlists", playlists.len());
        Ok(playlists)
    }

    /// Get every track of a playlist, in playlist order
    ///
    /// Removed tracks and podcast episodes are skipped.
    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let url = self.build_url(&format!(
            "playlists/{}/tracks?limit={}&additional_types=track",
            urlencoding::encode(playlist_id),
            PLAYLIST_ITEMS_PAGE
        ));
        let items: Vec<PlaylistItem> = self.collect_pages(url).await?;

        let tracks: Vec<Track> = items
            .into_iter()
            .filter_map(|item| item.track)
            .filter(Track::is_track)
            .collect();

        debug!("Playlist {} has {} tracks", playlist_id, tracks.len());
        Ok(tracks)
    }

    /// Get every saved ("liked") track
    pub async fn saved_tracks(&self) -> Result<Vec<Track>> {
        let url = self.build_url(&format!("me/tracks?limit={}", SAVED_TRACKS_PAGE));
        let items: Vec<SavedTrack> = self.collect_pages(url).await?;
        debug!("Found {} saved tracks", items.len());
        Ok(items.into_iter().map(|saved| saved.track).collect())
    }

    /// Get the user's top tracks (single page, `limit` at most 50)
    pub async fn top_tracks(&self, limit: u32) -> Result<Vec<Track>> {
        let url = self.build_url(&format!("me/top/tracks?limit={}", limit));
        let page: Paging<Track> = self.get_json(&url).await?;
        Ok(page.items)
    }

    /// Get recommendations seeded by up to five track ids
    pub async fn recommendations(&self, seed_track_ids: &[String], limit: u32) -> Result<Vec<Track>> {
        if seed_track_ids.is_empty() {
            anyhow::bail!("Recommendations need at least one seed track");
        }

        let url = self.build_url(&recommendations_query(seed_track_ids, limit));
        let response: Recommendations = self.get_json(&url).await?;
        Ok(response.tracks)
    }

    /// Get a full artist object
    pub async fn artist(&self, artist_id: &str) -> Result<Artist> {
        let url = self.build_url(&format!("artists/{}", urlencoding::encode(artist_id)));
        self.get_json(&url).await
    }

    /// Download an image from the Spotify CDN (no authentication needed)
    pub async fn fetch_image(&self, url: &str) -> Result<bytes::Bytes> {
        debug!("Fetching image: {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .context("Failed to fetch image")?;

        if !response.status().is_success() {
            anyhow::bail!("Image not available (status {})", response.status());
        }

        response
            .bytes()
            .await
            .context("Failed to read image response")
    }
}

/// Endpoint path for a recommendations request
fn recommendations_query(seed_track_ids: &[String], limit: u32) -> String {
    let seeds = seed_track_ids
        .iter()
        .map(|id| urlencoding::encode(id).into_owned())
        .collect::<Vec<_>>()
        .join(",");
    format!("recommendations?seed_tracks={}&limit={}", seeds, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_joins_paths() {
        let client = SpotifyClient::new("token").unwrap();
        assert_eq!(client.build_url("me"), "https://api.spotify.com/v1/me");
        assert_eq!(
            client.build_url("/me/tracks?limit=50"),
            "https://api.spotify.com/v1/me/tracks?limit=50"
        );
    }

    #[test]
    fn test_recommendations_query() {
        let seeds = vec!["a1".to_string(), "b2".to_string()];
        assert_eq!(
            recommendations_query(&seeds, 20),
            "recommendations?seed_tracks=a1,b2&limit=20"
        );
    }

    #[test]
    fn test_unauthorized_downcasts() {
        let err: anyhow::Error = Unauthorized.into();
        assert!(err.downcast_ref::<Unauthorized>().is_some());
    }
}
