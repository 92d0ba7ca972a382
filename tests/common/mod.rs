#![allow(dead_code)]

use async_trait::async_trait;
use gcal_mcp::auth::{Authorizer, CredentialProvider, StoredToken};
use gcal_mcp::config::{Config, OAuthClientConfig, CALENDAR_READONLY_SCOPE};
use gcal_mcp::error::{auth_error, google_calendar_error, GcalResult};
use gcal_mcp::google_calendar::{CalendarApi, CalendarEvent, CalendarListEntry, EventQuery, EventStart};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Timed event
pub fn timed_event(id: &str, summary: Option<&str>, start: &str) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        summary: summary.map(str::to_string),
        start: EventStart {
            date_time: Some(start.to_string()),
            date: None,
        },
        calendar_id: "primary".to_string(),
    }
}

/// All-day event
pub fn all_day_event(id: &str, summary: Option<&str>, date: &str) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        summary: summary.map(str::to_string),
        start: EventStart {
            date_time: None,
            date: Some(date.to_string()),
        },
        calendar_id: "primary".to_string(),
    }
}

/// In-memory calendar that records every query it receives
#[derive(Clone, Default)]
pub struct MockCalendar {
    pub events: Vec<CalendarEvent>,
    pub calendars: Vec<CalendarListEntry>,
    pub failure: Option<String>,
    pub queries: Arc<Mutex<Vec<EventQuery>>>,
    pub calendar_list_calls: Arc<AtomicUsize>,
}

impl MockCalendar {
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn with_calendars(calendars: Vec<CalendarListEntry>) -> Self {
        Self {
            calendars,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn recorded_queries(&self) -> Vec<EventQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn list_events(&self, query: &EventQuery) -> GcalResult<Vec<CalendarEvent>> {
        self.queries.lock().unwrap().push(query.clone());
        match &self.failure {
            Some(message) => Err(google_calendar_error(message)),
            None => Ok(self.events.clone()),
        }
    }

    async fn list_calendars(&self) -> GcalResult<Vec<CalendarListEntry>> {
        self.calendar_list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(google_calendar_error(message)),
            None => Ok(self.calendars.clone()),
        }
    }
}

/// Why the provider could not hand out a client
#[derive(Clone, Debug)]
pub enum ProviderFailure {
    Auth(String),
    /// Anything else, such as a misconfigured API base URL
    Client(String),
}

/// Credential provider handing out the mock calendar, or failing as configured
pub struct MockProvider {
    pub calendar: MockCalendar,
    pub failure: Option<ProviderFailure>,
}

impl MockProvider {
    pub fn new(calendar: MockCalendar) -> Self {
        Self {
            calendar,
            failure: None,
        }
    }

    pub fn unauthenticated(message: &str) -> Self {
        Self {
            calendar: MockCalendar::default(),
            failure: Some(ProviderFailure::Auth(message.to_string())),
        }
    }

    pub fn unavailable(message: &str) -> Self {
        Self {
            calendar: MockCalendar::default(),
            failure: Some(ProviderFailure::Client(message.to_string())),
        }
    }
}

#[async_trait]
impl CredentialProvider for MockProvider {
    async fn obtain_client(&self) -> GcalResult<Box<dyn CalendarApi>> {
        match &self.failure {
            Some(ProviderFailure::Auth(message)) => Err(auth_error(message)),
            Some(ProviderFailure::Client(message)) => Err(google_calendar_error(message)),
            None => Ok(Box::new(self.calendar.clone())),
        }
    }
}

/// Authorizer that hands out a fixed token and counts how often it ran
pub struct MockAuthorizer {
    pub token: StoredToken,
    pub calls: Arc<AtomicUsize>,
}

impl MockAuthorizer {
    pub fn new(access_token: &str) -> Self {
        Self {
            token: token_expiring_in(access_token, Some("1//fresh-refresh"), 3600),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authorizer for MockAuthorizer {
    async fn authorize(&self, _oauth: &OAuthClientConfig, _scopes: &[String]) -> GcalResult<StoredToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }
}

pub fn token_expiring_in(access_token: &str, refresh_token: Option<&str>, secs: i64) -> StoredToken {
    StoredToken {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        token_uri: None,
        client_id: Some("test-client".to_string()),
        scopes: vec![CALENDAR_READONLY_SCOPE.to_string()],
        expiry: Some(chrono::Utc::now() + chrono::Duration::seconds(secs)),
    }
}

/// Config pointing every endpoint at local fakes
pub fn test_config(token_path: &Path, token_uri: &str, api_base_url: &str) -> Config {
    Config {
        oauth: OAuthClientConfig {
            client_id: Some("test-client".to_string()),
            client_secret: Some("test-secret".to_string()),
            auth_uri: "http://127.0.0.1:1/auth".to_string(),
            token_uri: token_uri.to_string(),
        },
        token_path: token_path.to_path_buf(),
        api_base_url: api_base_url.to_string(),
        http_timeout_secs: 5,
        ..Config::default()
    }
}

/// A request captured by the fake HTTP server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    pub authorization: Option<String>,
}

impl RecordedRequest {
    /// Decoded query string pair
    pub fn query(&self, key: &str) -> Option<String> {
        let url = url::Url::parse(&format!("http://localhost{}", self.url)).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Decoded form body pair
    pub fn form(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

/// Minimal HTTP server answering with canned responses, in order
pub struct FakeHttp {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeHttp {
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        std::thread::spawn(move || {
            for (status, body) in responses {
                let mut request = match server.recv_timeout(Duration::from_secs(10)) {
                    Ok(Some(request)) => request,
                    _ => return,
                };

                let mut request_body = String::new();
                let _ = request.as_reader().read_to_string(&mut request_body);
                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string());

                recorded.lock().unwrap().push(RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    body: request_body,
                    authorization,
                });

                let _ = request.respond(tiny_http::Response::from_string(body).with_status_code(status));
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}
