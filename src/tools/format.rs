use crate::google_calendar::{CalendarEvent, CalendarListEntry};

pub const NO_TITLE: &str = "(No title)";
pub const NO_NAME: &str = "(No name)";
pub const NO_START: &str = "(No start)";
pub const BULLET: &str = "•";

pub const NO_UPCOMING_EVENTS: &str = "No upcoming events found.";
pub const NO_CALENDARS: &str = "No calendars found.";

pub fn no_events_for_date(date: &str) -> String {
    format!("No events found for {}.", date)
}

pub fn no_events_matching(query: &str) -> String {
    format!("No events found matching '{}'.", query)
}

/// `• {start}: {summary}`
pub fn event_line(event: &CalendarEvent) -> String {
    let start = event.start.as_display().unwrap_or(NO_START);
    let summary = event.summary.as_deref().unwrap_or(NO_TITLE);
    format!("{} {}: {}", BULLET, start, summary)
}

/// One line per event, under an optional header
pub fn event_list(header: Option<String>, events: &[CalendarEvent]) -> String {
    header
        .into_iter()
        .chain(events.iter().map(event_line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two-line entry: name with primary marker, then the id
pub fn calendar_entry(calendar: &CalendarListEntry) -> String {
    let name = calendar.summary.as_deref().unwrap_or(NO_NAME);
    let primary = if calendar.primary { " (primary)" } else { "" };
    format!("{} {}{}\n  ID: {}", BULLET, name, primary, calendar.id)
}

pub fn calendar_list(calendars: &[CalendarListEntry]) -> String {
    std::iter::once("Available calendars:".to_string())
        .chain(calendars.iter().map(calendar_entry))
        .collect::<Vec<_>>()
        .join("\n")
}
