pub mod auth;
pub mod config;
pub mod error;
pub mod google_calendar;
pub mod mcp;
pub mod startup;
pub mod tools;
