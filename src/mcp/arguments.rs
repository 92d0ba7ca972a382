use crate::tools::{DEFAULT_CALENDAR_ID, DEFAULT_MAX_RESULTS};
use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpcomingEventsArgs {
    /// Maximum number of events to return (default 10)
    #[serde(default, deserialize_with = "positive_count")]
    #[schemars(with = "Option<u32>", range(min = 1))]
    pub max_results: Option<u32>,
    /// Calendar ID to query, see list_calendars (default "primary")
    #[serde(default)]
    pub calendar_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EventsForDateArgs {
    /// Date in YYYY-MM-DD format
    pub date: String,
    /// Calendar ID to query, see list_calendars (default "primary")
    #[serde(default)]
    pub calendar_id: Option<String>,
    /// Maximum number of events to return
    #[serde(default, deserialize_with = "positive_count")]
    #[schemars(with = "Option<u32>", range(min = 1))]
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchEventsArgs {
    /// Search term
    pub query: String,
    /// Maximum number of events to return (default 10)
    #[serde(default, deserialize_with = "positive_count")]
    #[schemars(with = "Option<u32>", range(min = 1))]
    pub max_results: Option<u32>,
    /// Calendar ID to query, see list_calendars (default "primary")
    #[serde(default)]
    pub calendar_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListCalendarsArgs {}

pub(crate) fn calendar_or_primary(calendar_id: Option<String>) -> String {
    calendar_id.unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string())
}

pub(crate) fn count_or_default(max_results: Option<u32>) -> u32 {
    max_results.unwrap_or(DEFAULT_MAX_RESULTS)
}

/// Positive integer; numeric strings are accepted since some clients send them
fn positive_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    const INVALID: &str = "'max_results' must be a positive integer";

    let value = match Option::<Raw>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Raw::Number(number)) => number,
        Some(Raw::Text(raw)) => raw.trim().parse::<u64>().map_err(|_| D::Error::custom(INVALID))?,
    };

    match u32::try_from(value) {
        Ok(value) if value >= 1 => Ok(Some(value)),
        _ => Err(D::Error::custom(INVALID)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn omitted_arguments_fall_back_to_defaults() {
        let args: UpcomingEventsArgs = serde_json::from_value(json!({})).unwrap();
        assert_eq!(count_or_default(args.max_results), 10);
        assert_eq!(calendar_or_primary(args.calendar_id), "primary");
    }

    #[test]
    fn date_is_required() {
        assert!(serde_json::from_value::<EventsForDateArgs>(json!({"calendar_id": "team"})).is_err());
    }

    #[test]
    fn max_results_must_be_positive() {
        for bad in [json!(0), json!(-3), json!(2.5), json!("many"), json!(true), json!(u64::MAX)] {
            let result = serde_json::from_value::<UpcomingEventsArgs>(json!({ "max_results": bad.clone() }));
            assert!(result.is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn numeric_string_max_results_is_accepted() {
        let args: SearchEventsArgs =
            serde_json::from_value(json!({"query": "standup", "max_results": " 5", "calendar_id": "team"})).unwrap();
        assert_eq!(args.max_results, Some(5));
        assert_eq!(args.calendar_id.as_deref(), Some("team"));
    }

    #[test]
    fn null_max_results_means_default() {
        let args: EventsForDateArgs =
            serde_json::from_value(json!({"date": "2024-03-15", "max_results": null})).unwrap();
        assert_eq!(args.max_results, None);
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        assert!(serde_json::from_value::<UpcomingEventsArgs>(json!({"limit": 5})).is_err());
        assert!(serde_json::from_value::<ListCalendarsArgs>(json!({"calendar_id": "x"})).is_err());
    }

    #[test]
    fn schema_forbids_extra_properties() {
        let schema = serde_json::to_value(schemars::schema_for!(SearchEventsArgs)).unwrap();
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["required"], json!(["query"]));
    }
}
