use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the server
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(gcal_mcp::config))]
    Config(String),

    #[error("Authentication error: {0}")]
    #[diagnostic(
        code(gcal_mcp::auth),
        help("run `get_calendar_token` to authorize access to your calendar")
    )]
    Auth(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(gcal_mcp::google_calendar))]
    GoogleCalendar(String),

    #[error("Protocol error: {0}")]
    #[diagnostic(code(gcal_mcp::protocol))]
    Protocol(String),

    #[error(transparent)]
    #[diagnostic(code(gcal_mcp::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(gcal_mcp::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(gcal_mcp::other))]
    Other(String),
}

impl Error {
    /// Whether this error came out of the credential layer
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type GcalResult<T> = Result<T, Error>;

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create authentication errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create protocol errors
pub fn protocol_error(message: &str) -> Error {
    Error::Protocol(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
