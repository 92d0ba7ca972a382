use crate::error::{config_error, GcalResult};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only calendar access
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Google's OAuth endpoints
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Calendar API v3 root
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Directory name under the user config dir
pub const APP_DIR: &str = "gcal-mcp";

const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Main configuration structure for the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OAuth client used for the installed-app flow and token refresh
    pub oauth: OAuthClientConfig,
    /// Where the authorized token is persisted
    pub token_path: PathBuf,
    /// Scopes requested during authorization
    pub scopes: Vec<String>,
    /// Calendar API root, overridable for testing against a fake
    pub api_base_url: String,
    /// How long the interactive flow waits for the browser redirect
    pub auth_timeout_secs: u64,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout_secs: u64,
}

/// OAuth client identity. Only needed when a refresh or an interactive
/// authorization actually runs.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Optional on-disk overrides, every field may be omitted
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    token_path: Option<PathBuf>,
    api_base_url: Option<String>,
    auth_timeout_secs: Option<u64>,
    http_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oauth: OAuthClientConfig {
                client_id: None,
                client_secret: None,
                auth_uri: DEFAULT_AUTH_URI.to_string(),
                token_uri: DEFAULT_TOKEN_URI.to_string(),
            },
            token_path: default_token_path(),
            scopes: vec![CALENDAR_READONLY_SCOPE.to_string()],
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from .env, the optional config file and the environment
    pub fn load() -> GcalResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let file_path = env::var("GCAL_MCP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_dir().join("config.toml"));

        let mut config = Self::default();
        if let Some(file) = read_file_config(&file_path)? {
            config.apply_file(file);
        }
        config.apply_env(|key| env::var(key).ok())?;

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if file.client_id.is_some() {
            self.oauth.client_id = file.client_id;
        }
        if file.client_secret.is_some() {
            self.oauth.client_secret = file.client_secret;
        }
        if let Some(uri) = file.auth_uri {
            self.oauth.auth_uri = uri;
        }
        if let Some(uri) = file.token_uri {
            self.oauth.token_uri = uri;
        }
        if let Some(path) = file.token_path {
            self.token_path = path;
        }
        if let Some(url) = file.api_base_url {
            self.api_base_url = url;
        }
        if let Some(secs) = file.auth_timeout_secs {
            self.auth_timeout_secs = secs;
        }
        if let Some(secs) = file.http_timeout_secs {
            self.http_timeout_secs = secs;
        }
    }

    /// Apply environment overrides through a lookup function so tests don't
    /// have to mutate the process environment
    fn apply_env<F>(&mut self, lookup: F) -> GcalResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("GOOGLE_CLIENT_ID") {
            self.oauth.client_id = Some(id);
        }
        if let Some(secret) = lookup("GOOGLE_CLIENT_SECRET") {
            self.oauth.client_secret = Some(secret);
        }
        if let Some(uri) = lookup("GCAL_MCP_AUTH_URI") {
            self.oauth.auth_uri = uri;
        }
        if let Some(uri) = lookup("GCAL_MCP_TOKEN_URI") {
            self.oauth.token_uri = uri;
        }
        if let Some(path) = lookup("GCAL_MCP_TOKEN_PATH") {
            self.token_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("GCAL_MCP_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup("GCAL_MCP_AUTH_TIMEOUT_SECS") {
            self.auth_timeout_secs = parse_secs("GCAL_MCP_AUTH_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("GCAL_MCP_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = parse_secs("GCAL_MCP_HTTP_TIMEOUT_SECS", &raw)?;
        }
        Ok(())
    }
}

fn parse_secs(var: &str, raw: &str) -> GcalResult<u64> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or_else(|| config_error(&format!("Invalid {} value: {}", var, raw)))
}

fn read_file_config(path: &Path) -> GcalResult<Option<FileConfig>> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let file = toml::from_str::<FileConfig>(&content).map_err(|e| {
                config_error(&format!("Failed to parse {}: {}", path.display(), e))
            })?;
            Ok(Some(file))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// `$XDG_CONFIG_HOME/gcal-mcp` or the platform equivalent
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default location of the persisted token
pub fn default_token_path() -> PathBuf {
    default_config_dir().join("token.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_google() {
        let config = Config::default();
        assert_eq!(config.oauth.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.scopes, vec![CALENDAR_READONLY_SCOPE.to_string()]);
        assert!(config.token_path.ends_with("gcal-mcp/token.json"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        let file: FileConfig = toml::from_str(
            r#"
            client_id = "from-file"
            client_secret = "file-secret"
            http_timeout_secs = 5
            "#,
        )
        .unwrap();
        config.apply_file(file);
        config
            .apply_env(lookup(&[
                ("GOOGLE_CLIENT_ID", "from-env"),
                ("GCAL_MCP_TOKEN_PATH", "/tmp/token.json"),
            ]))
            .unwrap();

        assert_eq!(config.oauth.client_id.as_deref(), Some("from-env"));
        assert_eq!(config.oauth.client_secret.as_deref(), Some("file-secret"));
        assert_eq!(config.http_timeout_secs, 5);
        assert_eq!(config.token_path, PathBuf::from("/tmp/token.json"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = Config::default();
        let result = config.apply_env(lookup(&[("GCAL_MCP_HTTP_TIMEOUT_SECS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_file_config(&dir.path().join("absent.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn debug_output_hides_client_secret() {
        let oauth = OAuthClientConfig {
            client_secret: Some("super-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", oauth);
        assert!(!rendered.contains("super-secret"));
    }
}
