pub mod format;

use crate::auth::CredentialProvider;
use crate::error::{Error, GcalResult};
use crate::google_calendar::time::parse_day;
use crate::google_calendar::EventQuery;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const DEFAULT_CALENDAR_ID: &str = "primary";

pub const FETCHING_EVENTS: &str = "fetching events";
pub const SEARCHING_EVENTS: &str = "searching events";
pub const LISTING_CALENDARS: &str = "listing calendars";

/// Result of a tool call once a client was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(String),
    Failure { action: &'static str, detail: String },
}

impl ToolOutcome {
    fn failure(action: &'static str, err: &Error) -> Self {
        let detail = match err {
            Error::GoogleCalendar(message) => message.clone(),
            other => other.to_string(),
        };
        warn!("Error {}: {}", action, detail);
        ToolOutcome::Failure { action, detail }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToolOutcome::Failure { .. })
    }

    /// The text handed back to the caller
    pub fn render(&self) -> String {
        match self {
            ToolOutcome::Success(text) => text.clone(),
            ToolOutcome::Failure { action, detail } => format!("Error {}: {}", action, detail),
        }
    }
}

/// The four read-only calendar tools.
///
/// Errors from the credential provider are returned as `Err`; failures after
/// a client was obtained become `ToolOutcome::Failure`.
#[derive(Clone)]
pub struct CalendarTools {
    provider: Arc<dyn CredentialProvider>,
}

impl CalendarTools {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self { provider }
    }

    /// Events starting from now
    pub async fn get_upcoming_events(&self, max_results: u32, calendar_id: &str) -> GcalResult<ToolOutcome> {
        info!("Fetching up to {} upcoming events from {}", max_results, calendar_id);
        let client = self.provider.obtain_client().await?;

        let query = EventQuery::upcoming(calendar_id, Utc::now(), max_results);
        let outcome = match client.list_events(&query).await {
            Ok(events) if events.is_empty() => ToolOutcome::Success(format::NO_UPCOMING_EVENTS.to_string()),
            Ok(events) => ToolOutcome::Success(format::event_list(None, &events)),
            Err(e) => ToolOutcome::failure(FETCHING_EVENTS, &e),
        };
        Ok(outcome)
    }

    /// Events within one UTC day
    pub async fn get_events_for_date(
        &self,
        date: &str,
        calendar_id: &str,
        max_results: Option<u32>,
    ) -> GcalResult<ToolOutcome> {
        info!("Fetching events for {} from {}", date, calendar_id);
        let client = self.provider.obtain_client().await?;

        let day = match parse_day(date) {
            Ok(day) => day,
            Err(e) => return Ok(ToolOutcome::failure(FETCHING_EVENTS, &e)),
        };

        let query = EventQuery::for_day(calendar_id, day, max_results);
        let outcome = match client.list_events(&query).await {
            Ok(events) if events.is_empty() => ToolOutcome::Success(format::no_events_for_date(date)),
            Ok(events) => ToolOutcome::Success(format::event_list(
                Some(format!("Events for {}:", date)),
                &events,
            )),
            Err(e) => ToolOutcome::failure(FETCHING_EVENTS, &e),
        };
        Ok(outcome)
    }

    /// Upcoming events matching a keyword
    pub async fn search_events(&self, query: &str, max_results: u32, calendar_id: &str) -> GcalResult<ToolOutcome> {
        info!("Searching {} for '{}'", calendar_id, query);
        let client = self.provider.obtain_client().await?;

        let event_query = EventQuery::search(calendar_id, Utc::now(), max_results, query);
        let outcome = match client.list_events(&event_query).await {
            Ok(events) if events.is_empty() => ToolOutcome::Success(format::no_events_matching(query)),
            Ok(events) => ToolOutcome::Success(format::event_list(
                Some(format!("Events matching '{}':", query)),
                &events,
            )),
            Err(e) => ToolOutcome::failure(SEARCHING_EVENTS, &e),
        };
        Ok(outcome)
    }

    /// Calendars visible to the user
    pub async fn list_calendars(&self) -> GcalResult<ToolOutcome> {
        info!("Listing calendars");
        let client = self.provider.obtain_client().await?;

        let outcome = match client.list_calendars().await {
            Ok(calendars) if calendars.is_empty() => ToolOutcome::Success(format::NO_CALENDARS.to_string()),
            Ok(calendars) => ToolOutcome::Success(format::calendar_list(&calendars)),
            Err(e) => ToolOutcome::failure(LISTING_CALENDARS, &e),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_renders_with_action_prefix() {
        let outcome = ToolOutcome::Failure {
            action: SEARCHING_EVENTS,
            detail: "HTTP 400 Bad Request - Invalid value".to_string(),
        };
        assert!(outcome.is_failure());
        assert_eq!(
            outcome.render(),
            "Error searching events: HTTP 400 Bad Request - Invalid value"
        );
    }

    #[test]
    fn google_calendar_errors_drop_their_category_prefix() {
        let err = crate::error::google_calendar_error("HTTP 404 Not Found - Not Found");
        let outcome = ToolOutcome::failure(FETCHING_EVENTS, &err);
        assert_eq!(outcome.render(), "Error fetching events: HTTP 404 Not Found - Not Found");
    }
}
