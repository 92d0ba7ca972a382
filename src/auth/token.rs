use crate::error::{auth_error, GcalResult};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Tokens this close to expiry are refreshed before use
pub const REFRESH_SKEW_SECS: i64 = 225;

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// The persisted OAuth credential
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    #[serde(rename = "token", alias = "access_token")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl StoredToken {
    /// Expired, or close enough that it would lapse mid-request
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(REFRESH_SKEW_SECS) >= expiry,
            None => false,
        }
    }

    /// Every required scope was granted. Tokens saved without a scope list are
    /// assumed to carry what was asked for.
    pub fn covers(&self, required: &[String]) -> bool {
        self.scopes.is_empty() || required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Usable as a bearer token right now
    pub fn is_valid_at(&self, now: DateTime<Utc>, required: &[String]) -> bool {
        !self.access_token.is_empty() && self.covers(required) && !self.is_expired_at(now)
    }

    /// Has what a refresh needs
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Build a token from an endpoint response. The previous refresh token is
    /// kept when the response does not rotate it.
    pub fn from_response(
        response: TokenResponse,
        now: DateTime<Utc>,
        previous: Option<&StoredToken>,
        client_id: &str,
        token_uri: &str,
        requested_scopes: &[String],
    ) -> Self {
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let scopes = match response.scope.as_deref() {
            Some(granted) if !granted.trim().is_empty() => {
                granted.split_whitespace().map(str::to_string).collect()
            }
            _ => previous
                .filter(|p| !p.scopes.is_empty())
                .map(|p| p.scopes.clone())
                .unwrap_or_else(|| requested_scopes.to_vec()),
        };

        Self {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            token_uri: Some(token_uri.to_string()),
            client_id: Some(client_id.to_string()),
            scopes,
            expiry: Some(now + Duration::seconds(expires_in)),
        }
    }
}

/// Successful reply from the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// POST a form to the token endpoint. Every failure is an authentication error.
pub(crate) async fn request_token(
    client: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
    action: &str,
) -> GcalResult<TokenResponse> {
    let response = client
        .post(token_uri)
        .form(params)
        .send()
        .await
        .map_err(|e| auth_error(&format!("Failed to {}: {}", action, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        return Err(auth_error(&format!(
            "Failed to {}: HTTP {} - {}",
            action,
            status,
            error_body.trim()
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))
}
