//! Spotify authorization and access-token storage
//!
//! The token is kept as plain text in ~/.config/tunefetch/user_token.txt. When
//! it is missing or rejected, the user walks through the authorization-code
//! flow in the terminal: open a URL, paste back the redirect.

use anyhow::{Context, Result};
use dialoguer::Input;
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;

use crate::config;
use crate::spotify::{SpotifyClient, TokenResponse, Unauthorized};

const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const TOKEN_FILE: &str = "user_token.txt";

/// Must match the redirect URI registered for the Spotify app
pub const REDIRECT_URI: &str = "http://localhost:5000/callback";

const SCOPES: &[&str] = &[
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-library-read",
    "user-top-read",
    "user-read-private",
];

/// Client id and secret of the registered Spotify app
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl AppCredentials {
    /// Both values are needed to run the authorization flow
    pub fn from_parts(client_id: Option<String>, client_secret: Option<String>) -> Option<Self> {
        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(Self {
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        }
    }
}

/// Manages the cached access token
pub struct AuthManager {
    token_path: PathBuf,
}

impl AuthManager {
    /// Token stored in the application's config directory
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(config::app_dir()?.join(TOKEN_FILE)))
    }

    pub fn with_path(token_path: PathBuf) -> Self {
        Self { token_path }
    }

    /// Produce a client holding a token the API accepts
    ///
    /// Reuses the stored token unless `force` is set or the API rejects it,
    /// in which case the authorization flow runs and the new token is saved.
    pub async fn authenticate(
        &self,
        app: Option<&AppCredentials>,
        force: bool,
    ) -> Result<SpotifyClient> {
        if force {
            debug!("Force flag set, ignoring stored token");
        } else if let Some(token) = self.load() {
            let client = SpotifyClient::new(&token)?;
            match client.current_user().await {
                Ok(user) => {
                    debug!("Stored token is valid for {}", user.id);
                    return Ok(client);
                }
                Err(e) if e.downcast_ref::<Unauthorized>().is_some() => {
                    warn!("Existing token is invalid, requesting a new one");
                }
                Err(e) => return Err(e.context("Failed to validate stored token")),
            }
        }

        let app = app.context(
            "No valid Spotify token. Set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET to log in.",
        )?;

        let token = authorize_interactively(app).await?;
        self.save(&token.access_token);

        let client = SpotifyClient::new(&token.access_token)?;
        client
            .current_user()
            .await
            .context("Spotify rejected the newly issued token")?;
        Ok(client)
    }

    /// Read the stored token; a read failure is a warning, not an error
    pub fn load(&self) -> Option<String> {
        if !self.token_path.exists() {
            debug!("No token file at {}", self.token_path.display());
            return None;
        }

        match fs::read_to_string(&self.token_path) {
            Ok(contents) => Some(contents.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Could not read token file: {}", e);
                None
            }
        }
    }

    /// Persist a token; a write failure is a warning, not an error
    pub fn save(&self, token: &str) {
        let written = self
            .token_path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&self.token_path, token));

        match written {
            Ok(()) => debug!("Saved token to {}", self.token_path.display()),
            Err(e) => warn!("Could not save token: {}", e),
        }
    }

    /// Delete the stored token; returns whether there was one
    pub fn logout(&self) -> Result<bool> {
        if !self.token_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.token_path)
            .with_context(|| format!("Failed to delete {}", self.token_path.display()))?;
        info!("Token removed");
        Ok(true)
    }
}

/// Run the authorization-code flow in the terminal
async fn authorize_interactively(app: &AppCredentials) -> Result<TokenResponse> {
    let state = random_state();
    let url = authorize_url(&app.client_id, &state)?;

    println!("Open this URL in your browser and approve access:");
    println!();
    println!("  {}", url);
    println!();

    let redirected: String = Input::new()
        .with_prompt("Paste the URL you were redirected to")
        .interact_text()
        .context("Failed to read redirect URL")?;

    let code = parse_redirect(&redirected, &state)?;
    exchange_code(app, &code).await
}

/// URL the user opens to grant access
fn authorize_url(client_id: &str, state: &str) -> Result<Url> {
    let scope = SCOPES.join(" ");
    let url = Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", REDIRECT_URI),
            ("scope", scope.as_str()),
            ("state", state),
        ],
    )
    .context("Failed to build authorization URL")?;
    Ok(url)
}

/// Pull the authorization code out of the redirect, checking `state`
fn parse_redirect(redirected: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(redirected.trim()).context("Not a valid URL")?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => anyhow::bail!("Authorization denied: {}", value),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        anyhow::bail!("Authorization state mismatch; start the login again");
    }
    code.context("Redirect URL has no authorization code")
}

/// Trade an authorization code for an access token
async fn exchange_code(app: &AppCredentials, code: &str) -> Result<TokenResponse> {
    debug!("Exchanging authorization code at {}", TOKEN_URL);

    let response = reqwest::Client::new()
        .post(TOKEN_URL)
        .basic_auth(&app.client_id, Some(&app.client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
        ])
        .send()
        .await
        .context("Failed to reach Spotify accounts service")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Token exchange failed ({}): {}", status, body);
    }

    let token: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    info!("Obtained new access token (expires in {}s)", token.expires_in);
    Ok(token)
}

/// Random alphanumeric `state` value
fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}
