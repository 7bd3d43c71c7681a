//! Access tokens for authorized requests
//!
//! - `StaticToken`: a token obtained elsewhere
//! - `PasswordGrantTokenProvider`: OAuth2 username-password flow, fetched once
//!   and reused for the life of the provider

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// Token endpoint, relative to the instance URL
pub const TOKEN_PATH: &str = "/services/oauth2/token";

/// Supplies the bearer token for each request
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Current access token
    async fn access_token(&self) -> Result<SecretString>;
}

/// A token obtained outside the driver
#[derive(Clone)]
pub struct StaticToken(SecretString);

impl StaticToken {
    /// Wrap an existing token
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken([REDACTED])")
    }
}

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<SecretString> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth2 username-password grant against the instance token endpoint
pub struct PasswordGrantTokenProvider {
    client: reqwest::Client,
    token_url: String,
    consumer_key: String,
    consumer_secret: SecretString,
    username: String,
    password: SecretString,
    cached: Mutex<Option<SecretString>>,
}

impl std::fmt::Debug for PasswordGrantTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordGrantTokenProvider")
            .field("token_url", &self.token_url)
            .field("consumer_key", &self.consumer_key)
            .field("username", &self.username)
            .field("consumer_secret", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl PasswordGrantTokenProvider {
    /// Create a provider from connection configuration
    ///
    /// Fails when the configuration carries no username/password.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let username = config
            .username
            .clone()
            .ok_or_else(|| Error::config("username is required for the password grant"))?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| Error::config("password is required for the password grant"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token_url: format!("{}{TOKEN_PATH}", config.instance_url.trim_end_matches('/')),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            username,
            password,
            cached: Mutex::new(None),
        })
    }

    async fn request_token(&self) -> Result<SecretString> {
        debug!(url = %self.token_url, username = %self.username, "requesting access token");

        let form = [
            ("grant_type", "password"),
            ("client_id", self.consumer_key.as_str()),
            ("client_secret", self.consumer_secret.expose_secret()),
            ("username", self.username.as_str()),
            ("password", self.password.expose_secret()),
        ];

        let response = self.client.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = match serde_json::from_slice::<TokenError>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {description}", err.error),
                    None => err.error,
                },
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            warn!(status = status.as_u16(), "access token request rejected");
            return Err(Error::authentication(message));
        }

        let token: TokenResponse = serde_json::from_slice(&body)?;
        Ok(SecretString::from(token.access_token))
    }
}

#[async_trait]
impl AccessTokenProvider for PasswordGrantTokenProvider {
    async fn access_token(&self) -> Result<SecretString> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token = self.request_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }
}
