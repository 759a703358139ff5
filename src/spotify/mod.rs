//! Spotify Web API client module

pub mod client;
pub mod models;

pub use client::{SpotifyClient, Unauthorized};
pub use models::*;
