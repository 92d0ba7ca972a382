pub mod client;
pub mod models;
pub mod query;
pub mod time;

pub use client::{CalendarApi, GoogleCalendarClient};
pub use models::{CalendarEvent, CalendarListEntry, EventStart};
pub use query::EventQuery;
