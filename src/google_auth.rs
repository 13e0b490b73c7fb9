//! Bearer-token management for the Google APIs used by the Sheets store
//! and the Gmail mailer.

use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, thiserror::Error)]
pub enum GoogleAuthError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("token refresh failed: {0}")]
    TokenRefreshFailed(String),
    #[error("http error: {0}")]
    HttpError(String),
}

/// Credentials taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct GoogleAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// Pre-issued token, used as-is for an hour
    pub access_token: Option<String>,
    pub token_endpoint: Option<String>,
}

impl GoogleAuthConfig {
    pub fn from_env() -> Self {
        Self {
            client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET").ok(),
            refresh_token: std::env::var("GOOGLE_REFRESH_TOKEN").ok(),
            access_token: std::env::var("GOOGLE_ACCESS_TOKEN").ok(),
            token_endpoint: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.access_token.is_some()
            || (self.client_id.is_some()
                && self.client_secret.is_some()
                && self.refresh_token.is_some())
    }
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct GoogleAuth {
    config: GoogleAuthConfig,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn new(config: GoogleAuthConfig) -> Result<Self, GoogleAuthError> {
        if !config.is_valid() {
            return Err(GoogleAuthError::MissingCredentials(
                "either GOOGLE_ACCESS_TOKEN or (GOOGLE_CLIENT_ID + GOOGLE_CLIENT_SECRET + GOOGLE_REFRESH_TOKEN) must be set".to_string(),
            ));
        }

        let cached = config.access_token.as_ref().map(|token| CachedToken {
            value: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        });

        Ok(Self {
            config,
            client: reqwest::Client::new(),
            cached: Mutex::new(cached),
        })
    }

    pub fn from_env() -> Result<Self, GoogleAuthError> {
        Self::new(GoogleAuthConfig::from_env())
    }

    /// A valid access token, refreshed when within a minute of expiry.
    pub async fn access_token(&self) -> Result<String, GoogleAuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + Duration::from_secs(60) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.refresh().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn refresh(&self) -> Result<CachedToken, GoogleAuthError> {
        let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
            self.config.refresh_token.as_deref(),
        ) else {
            return Err(GoogleAuthError::MissingCredentials(
                "access token expired and no refresh credentials configured".to_string(),
            ));
        };

        log::debug!("Refreshing Google OAuth token");
        let endpoint = self
            .config
            .token_endpoint
            .as_deref()
            .unwrap_or(TOKEN_ENDPOINT);

        let response = self
            .client
            .post(endpoint)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| GoogleAuthError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("OAuth token refresh failed: {} - {}", status, body);
            return Err(GoogleAuthError::TokenRefreshFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| GoogleAuthError::TokenRefreshFailed(e.to_string()))?;

        Ok(CachedToken {
            value: token.access_token,
            expires_at: expiry_after(token.expires_in),
        })
    }
}

/// Tokens are never cached for more than a day, whatever the endpoint says.
const MAX_TOKEN_LIFETIME_SECS: i64 = 86_400;

fn expiry_after(expires_in: i64) -> Instant {
    let secs = expires_in.clamp(0, MAX_TOKEN_LIFETIME_SECS) as u64;
    let now = Instant::now();
    now.checked_add(Duration::from_secs(secs)).unwrap_or(now)
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
}
