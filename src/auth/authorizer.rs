use super::token::{request_token, StoredToken};
use crate::config::OAuthClientConfig;
use crate::error::{auth_error, GcalResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// Produces a fresh credential through the identity provider
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, oauth: &OAuthClientConfig, scopes: &[String]) -> GcalResult<StoredToken>;
}

/// Called with the consent page URL once the redirect listener is up
pub type ConsentHandler = Arc<dyn Fn(&Url) + Send + Sync>;

/// Installed-app flow: loopback redirect listener plus the system browser
pub struct LocalServerAuthorizer {
    client: Client,
    timeout: Duration,
    open_consent: ConsentHandler,
}

impl LocalServerAuthorizer {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            open_consent: Arc::new(open_in_browser),
        }
    }

    /// Replace how the consent page is presented to the user
    pub fn with_consent_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Url) + Send + Sync + 'static,
    {
        self.open_consent = Arc::new(handler);
        self
    }
}

fn open_in_browser(auth_url: &Url) {
    info!("Opening browser for Google Calendar authorization...");
    info!("If the browser does not open, visit: {}", auth_url);
    if let Err(e) = webbrowser::open(auth_url.as_str()) {
        warn!("Could not open browser: {}", e);
    }
}

#[async_trait]
impl Authorizer for LocalServerAuthorizer {
    async fn authorize(&self, oauth: &OAuthClientConfig, scopes: &[String]) -> GcalResult<StoredToken> {
        let (client_id, client_secret) = client_credentials(oauth)?;

        // Port 0 lets the OS pick a free port
        let server = Server::http("127.0.0.1:0")
            .map_err(|e| auth_error(&format!("Failed to start redirect listener: {}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| auth_error("Redirect listener has no TCP address"))?;
        let redirect_uri = format!("http://127.0.0.1:{}/", port);

        let state = Uuid::new_v4().to_string();
        let auth_url = authorization_url(oauth, client_id, &redirect_uri, scopes, &state)?;

        (self.open_consent)(&auth_url);

        let timeout = self.timeout;
        let code = tokio::task::spawn_blocking(move || wait_for_code(&server, &state, timeout))
            .await
            .map_err(|e| auth_error(&format!("Redirect listener task failed: {}", e)))??;

        info!("Authorization code received, exchanging for tokens");
        let response = request_token(
            &self.client,
            &oauth.token_uri,
            &[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ],
            "exchange authorization code",
        )
        .await?;

        Ok(StoredToken::from_response(
            response,
            Utc::now(),
            None,
            client_id,
            &oauth.token_uri,
            scopes,
        ))
    }
}

/// Client id and secret, both required for code exchange and refresh
pub(crate) fn client_credentials(oauth: &OAuthClientConfig) -> GcalResult<(&str, &str)> {
    let client_id = oauth
        .client_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| auth_error("GOOGLE_CLIENT_ID is not configured"))?;
    let client_secret = oauth
        .client_secret
        .as_deref()
        .filter(|secret| !secret.is_empty())
        .ok_or_else(|| auth_error("GOOGLE_CLIENT_SECRET is not configured"))?;
    Ok((client_id, client_secret))
}

/// Consent page URL requesting offline access so a refresh token is issued
pub fn authorization_url(
    oauth: &OAuthClientConfig,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> GcalResult<Url> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        &oauth.auth_uri,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| auth_error(&format!("Invalid authorization URI: {}", e)))
}

/// What a redirect to the listener carried
#[derive(Debug, PartialEq)]
pub(crate) enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    /// Favicon and other stray requests
    Unrelated,
}

pub(crate) fn parse_callback(request_url: &str, expected_state: &str) -> Callback {
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{}", request_url)) else {
        return Callback::Unrelated;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if code.is_none() && error.is_none() {
        return Callback::Unrelated;
    }
    if state.as_deref() != Some(expected_state) {
        return Callback::StateMismatch;
    }
    match (code, error) {
        (_, Some(error)) => Callback::Denied(error),
        (Some(code), None) => Callback::Code(code),
        (None, None) => Callback::Unrelated,
    }
}

/// Block until the browser redirect arrives or the timeout lapses
fn wait_for_code(server: &Server, expected_state: &str, timeout: Duration) -> GcalResult<String> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(auth_error("Timed out waiting for authorization callback"));
        }

        let request = server
            .recv_timeout(remaining)
            .map_err(|e| auth_error(&format!("Failed to receive authorization callback: {}", e)))?
            .ok_or_else(|| auth_error("Timed out waiting for authorization callback"))?;

        let (reply, status, outcome) = match parse_callback(request.url(), expected_state) {
            Callback::Unrelated => ("Not found", 404_u16, None),
            Callback::StateMismatch => (
                "Authorization failed: state mismatch.",
                400,
                Some(Err(auth_error("Authorization callback state did not match"))),
            ),
            Callback::Denied(reason) => (
                "Authorization was denied. You can close this window.",
                400,
                Some(Err(auth_error(&format!("Authorization denied: {}", reason)))),
            ),
            Callback::Code(code) => (
                "Authorization successful! You can close this window.",
                200,
                Some(Ok(code)),
            ),
        };

        if let Err(e) = request.respond(Response::from_string(reply).with_status_code(status)) {
            warn!("Failed to answer authorization callback: {}", e);
        }

        if let Some(outcome) = outcome {
            return outcome;
        }
    }
}
