use super::time::{day_bounds, format_instant};
use chrono::{DateTime, NaiveDate, Utc};

/// Filters for `events.list`. Recurring events are always expanded into
/// single instances ordered by start time.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub calendar_id: String,
    pub time_min: DateTime<Utc>,
    pub time_max: Option<DateTime<Utc>>,
    pub max_results: Option<u32>,
    pub search: Option<String>,
}

impl EventQuery {
    /// Events starting from `now`
    pub fn upcoming(calendar_id: &str, now: DateTime<Utc>, max_results: u32) -> Self {
        Self {
            calendar_id: calendar_id.to_string(),
            time_min: now,
            time_max: None,
            max_results: Some(max_results),
            search: None,
        }
    }

    /// Events within one UTC day
    pub fn for_day(calendar_id: &str, day: NaiveDate, max_results: Option<u32>) -> Self {
        let (start, end) = day_bounds(day);
        Self {
            calendar_id: calendar_id.to_string(),
            time_min: start,
            time_max: Some(end),
            max_results,
            search: None,
        }
    }

    /// Upcoming events matching a free-text keyword
    pub fn search(calendar_id: &str, now: DateTime<Utc>, max_results: u32, query: &str) -> Self {
        Self {
            search: Some(query.to_string()),
            ..Self::upcoming(calendar_id, now, max_results)
        }
    }

    /// Query string parameters in API naming
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("timeMin", format_instant(self.time_min)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(time_max) = self.time_max {
            pairs.push(("timeMax", format_instant(time_max)));
        }
        if let Some(max_results) = self.max_results {
            pairs.push(("maxResults", max_results.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("q", search.clone()));
        }
        pairs
    }
}
