use super::authorizer::{client_credentials, Authorizer, LocalServerAuthorizer};
use super::token::{request_token, StoredToken};
use crate::config::{Config, OAuthClientConfig};
use crate::error::{auth_error, other_error, GcalResult};
use crate::google_calendar::{CalendarApi, GoogleCalendarClient};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hands out calendar clients bound to a usable credential
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn obtain_client(&self) -> GcalResult<Box<dyn CalendarApi>>;
}

/// Owns the persisted token and everything needed to renew it
pub struct CredentialStore {
    token_path: PathBuf,
    scopes: Vec<String>,
    oauth: OAuthClientConfig,
    api_base_url: String,
    client: Client,
    authorizer: Arc<dyn Authorizer>,
}

impl CredentialStore {
    /// Build a store with the browser-based authorizer
    pub fn from_config(config: &Config) -> GcalResult<Self> {
        let client = http_client(config)?;
        let authorizer = LocalServerAuthorizer::new(
            client.clone(),
            Duration::from_secs(config.auth_timeout_secs),
        );
        Ok(Self::new(config, client, Arc::new(authorizer)))
    }

    pub fn new(config: &Config, client: Client, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            token_path: config.token_path.clone(),
            scopes: config.scopes.clone(),
            oauth: config.oauth.clone(),
            api_base_url: config.api_base_url.clone(),
            client,
            authorizer,
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Read the persisted token. Missing, unreadable and malformed files all
    /// come back as `None`.
    pub fn load(&self) -> Option<StoredToken> {
        let content = match fs::read_to_string(&self.token_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No token at {}", self.token_path.display());
                return None;
            }
            Err(e) => {
                warn!("Could not read token file {}: {}", self.token_path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<StoredToken>(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring malformed token file {}: {}", self.token_path.display(), e);
                None
            }
        }
    }

    /// Persist the token, creating the parent directory if needed. Written
    /// beside the target, then renamed over it.
    pub fn save(&self, token: &StoredToken) -> GcalResult<()> {
        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(token)?;
        let tmp_path = self.token_path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        restrict_permissions(&tmp_path)?;
        fs::rename(&tmp_path, &self.token_path)?;

        debug!("Saved token to {}", self.token_path.display());
        Ok(())
    }

    /// Exchange the refresh token for a new access token
    pub async fn refresh(&self, token: &StoredToken) -> GcalResult<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| auth_error("No refresh token in token data"))?;
        let (client_id, client_secret) = client_credentials(&self.oauth)?;

        info!("Refreshing Google Calendar access token");
        let response = request_token(
            &self.client,
            &self.oauth.token_uri,
            &[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
            "refresh token",
        )
        .await?;

        Ok(StoredToken::from_response(
            response,
            Utc::now(),
            Some(token),
            client_id,
            &self.oauth.token_uri,
            &self.scopes,
        ))
    }

    /// Run the interactive flow unconditionally and persist the result
    pub async fn authorize_interactive(&self) -> GcalResult<StoredToken> {
        let token = self.authorizer.authorize(&self.oauth, &self.scopes).await?;
        self.persist(&token)?;
        Ok(token)
    }

    /// Stored token if valid, else refreshed, else freshly authorized
    pub async fn obtain_token(&self) -> GcalResult<StoredToken> {
        let now = Utc::now();

        if let Some(token) = self.load() {
            if token.is_valid_at(now, &self.scopes) {
                debug!("Using stored token");
                return Ok(token);
            }
            if token.covers(&self.scopes) && token.can_refresh() {
                let refreshed = self.refresh(&token).await?;
                self.persist(&refreshed)?;
                return Ok(refreshed);
            }
            info!("Stored token cannot be used or refreshed, starting authorization");
        } else {
            info!("No stored token, starting authorization");
        }

        self.authorize_interactive().await
    }

    /// Calendar client bound to a usable token
    pub async fn calendar_client(&self) -> GcalResult<GoogleCalendarClient> {
        let token = self.obtain_token().await?;
        GoogleCalendarClient::new(self.client.clone(), &self.api_base_url, token.access_token)
    }

    fn persist(&self, token: &StoredToken) -> GcalResult<()> {
        self.save(token).map_err(|e| {
            auth_error(&format!(
                "Failed to save token to {}: {}",
                self.token_path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl CredentialProvider for CredentialStore {
    async fn obtain_client(&self) -> GcalResult<Box<dyn CalendarApi>> {
        let client = self.calendar_client().await?;
        Ok(Box::new(client))
    }
}

/// Shared HTTP client with the configured request timeout
pub fn http_client(config: &Config) -> GcalResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| other_error(&format!("Failed to build HTTP client: {}", e)))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
