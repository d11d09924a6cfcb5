use std::time::{Duration, Instant};

use log::{debug, info};
use reqwest::Client;
use tokio::sync::Mutex;

use crate::error::{MediaFsError, Result};
use crate::shopware_service::shopware_models::TokenResponse;

/// Token refresh buffer time in seconds (refresh a minute before expiry)
const TOKEN_REFRESH_BUFFER_SECS: u64 = 60;

/// Path of the token endpoint below the shop URL
const TOKEN_PATH: &str = "/api/oauth/token";

/// Error for a non-2xx answer of the token endpoint.
///
/// Rate limiting and server errors keep their status so the pacer retries
/// them; anything else means the credentials were refused.
fn token_endpoint_error(status: u16, body: String) -> MediaFsError {
    if status == 429 || (500..600).contains(&status) {
        MediaFsError::Context {
            context: "token request failed".to_string(),
            source: Box::new(MediaFsError::Http { status, body }),
        }
    } else {
        MediaFsError::Auth(format!("token endpoint returned {}: {}", status, body))
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + Duration::from_secs(TOKEN_REFRESH_BUFFER_SECS) < self.expires_at
    }
}

/// OAuth2 client-credentials token source for the shop's integration API
pub struct ClientCredentialsAuth {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsAuth {
    pub fn new(client: Client, shop_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            client,
            token_url: format!("{}{}", shop_url.trim_end_matches('/'), TOKEN_PATH),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Get a valid access token, fetching a new one when missing or expiring
    pub async fn get_valid_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(cached) = token.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
            debug!("Access token expires soon, refreshing");
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *token = Some(fresh);
        Ok(access_token)
    }

    /// Drop the cached token so the next request fetches a new one
    pub async fn invalidate(&self) {
        let mut token = self.token.lock().await;
        if token.take().is_some() {
            debug!("Invalidated cached access token");
        }
    }

    async fn request_token(&self) -> Result<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| MediaFsError::Transport(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(token_endpoint_error(status.as_u16(), body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MediaFsError::Auth(format!("invalid token response: {}", e)))?;

        info!("Obtained access token valid for {}s", token.expires_in);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}
