use super::models::{CalendarEvent, CalendarListEntry, CalendarListPage, EventsPage};
use super::query::EventQuery;
use crate::error::{google_calendar_error, GcalResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

/// Read-only operations the tools need from the calendar service
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// One page of events matching the query
    async fn list_events(&self, query: &EventQuery) -> GcalResult<Vec<CalendarEvent>>;

    /// Calendars visible to the authenticated user
    async fn list_calendars(&self) -> GcalResult<Vec<CalendarListEntry>>;
}

/// Calendar API v3 client bound to one access token
#[derive(Clone)]
pub struct GoogleCalendarClient {
    client: Client,
    base_url: Url,
    access_token: String,
}

impl std::fmt::Debug for GoogleCalendarClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCalendarClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl GoogleCalendarClient {
    pub fn new(client: Client, base_url: &str, access_token: String) -> GcalResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(google_calendar_error(&format!(
                "API base URL cannot take a path: {}",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            access_token,
        })
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> GcalResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| google_calendar_error("API base URL cannot take a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, action: &str) -> GcalResult<T> {
        debug!("GET {}", url.path());

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            warn!("Failed to {}: HTTP {}", action, status);
            return Err(google_calendar_error(&format!(
                "HTTP {} - {}",
                status,
                api_error_message(&error_body)
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn list_events(&self, query: &EventQuery) -> GcalResult<Vec<CalendarEvent>> {
        let mut url = self.endpoint(&["calendars", &query.calendar_id, "events"])?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.query_pairs() {
                pairs.append_pair(key, &value);
            }
        }

        let page: EventsPage = self.get_json(url, "fetch events").await?;
        let events = page
            .items
            .into_iter()
            .map(|event| CalendarEvent {
                calendar_id: query.calendar_id.clone(),
                ..event
            })
            .collect();

        Ok(events)
    }

    async fn list_calendars(&self) -> GcalResult<Vec<CalendarListEntry>> {
        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let page: CalendarListPage = self.get_json(url, "list calendars").await?;
        Ok(page.items)
    }
}

/// Pull `error.message` out of a Google error body, falling back to the raw text
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> GoogleCalendarClient {
        GoogleCalendarClient::new(Client::new(), base, "token".to_string()).unwrap()
    }

    #[test]
    fn calendar_id_is_a_single_encoded_segment() {
        let url = client("https://www.googleapis.com/calendar/v3")
            .endpoint(&["calendars", "team/room#1", "events"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team%2Froom%231/events"
        );
    }

    #[test]
    fn trailing_slash_in_base_is_tolerated() {
        let url = client("http://127.0.0.1:9000/")
            .endpoint(&["users", "me", "calendarList"])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/users/me/calendarList");
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(GoogleCalendarClient::new(Client::new(), "mailto:me@example.com", String::new()).is_err());
        assert!(GoogleCalendarClient::new(Client::new(), "not a url", String::new()).is_err());
    }

    #[test]
    fn extracts_google_error_message() {
        let body = r#"{"error": {"code": 404, "message": "Not Found", "errors": []}}"#;
        assert_eq!(api_error_message(body), "Not Found");
        assert_eq!(api_error_message("  upstream exploded \n"), "upstream exploded");
    }
}
