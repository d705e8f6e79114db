//! Timestamp extraction and date-range formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Field names tried, in order, for an event's start.
pub const START_FIELDS: &[&str] = &[
    "start_at",
    "starts_at",
    "startAt",
    "start",
    "start_date",
    "data_inizio",
    "inizio",
];

/// Field names tried, in order, for an event's end.
pub const END_FIELDS: &[&str] = &[
    "end_at",
    "ends_at",
    "endAt",
    "end",
    "end_date",
    "data_fine",
    "fine",
];

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

pub fn first_timestamp(fields: &Map<String, Value>, names: &[&str]) -> Option<DateTime<Utc>> {
    names
        .iter()
        .find_map(|name| fields.get(*name).and_then(timestamp_from_value))
}

fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => {
            let n = n.as_i64()?;
            if n.abs() >= EPOCH_MILLIS_THRESHOLD {
                Utc.timestamp_millis_opt(n).single()
            } else {
                Utc.timestamp_opt(n, 0).single()
            }
        }
        _ => None,
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]` / `YYYY-MM-DDTHH:MM[:SS]` (UTC)
/// and bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Compact label for a start/end pair, e.g. `12 Mar 2026, 18:00-21:00`.
pub fn format_date_range(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> String {
    match (start, end) {
        (Some(start), Some(end)) if start.date_naive() == end.date_naive() => format!(
            "{}, {}-{}",
            start.format("%-d %b %Y"),
            start.format("%H:%M"),
            end.format("%H:%M")
        ),
        (Some(start), Some(end)) => format!(
            "{} - {}",
            start.format("%-d %b %Y %H:%M"),
            end.format("%-d %b %Y %H:%M")
        ),
        (Some(start), None) => start.format("%-d %b %Y, %H:%M").to_string(),
        (None, Some(end)) => format!("until {}", end.format("%-d %b %Y %H:%M")),
        (None, None) => "Date to be announced".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn parses_common_shapes() {
        assert_eq!(at("2026-03-12T18:00:00+01:00"), at("2026-03-12T17:00:00Z"));
        assert_eq!(at("2026-03-12 18:00:00"), at("2026-03-12T18:00:00Z"));
        assert_eq!(at("2026-03-12 18:00"), at("2026-03-12T18:00:00Z"));
        assert_eq!(at("2026-03-12"), at("2026-03-12T00:00:00Z"));
        assert!(parse_timestamp("next tuesday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn first_matching_field_wins() {
        let fields = json!({ "start": "garbage", "data_inizio": "2026-03-12" });
        let fields = fields.as_object().unwrap();
        assert_eq!(first_timestamp(fields, START_FIELDS), Some(at("2026-03-12")));
    }

    #[test]
    fn epoch_seconds_and_millis() {
        let fields = json!({ "start_at": 1_773_338_400, "end_at": 1_773_349_200_000_i64 });
        let fields = fields.as_object().unwrap();
        assert_eq!(first_timestamp(fields, START_FIELDS), Some(at("2026-03-12T18:00:00Z")));
        assert_eq!(first_timestamp(fields, END_FIELDS), Some(at("2026-03-12T21:00:00Z")));
    }

    #[test]
    fn formats_ranges() {
        let start = at("2026-03-12T18:00:00Z");
        let same_day = at("2026-03-12T21:00:00Z");
        let next_day = at("2026-03-13T10:00:00Z");
        assert_eq!(format_date_range(Some(start), Some(same_day)), "12 Mar 2026, 18:00-21:00");
        assert_eq!(
            format_date_range(Some(start), Some(next_day)),
            "12 Mar 2026 18:00 - 13 Mar 2026 10:00"
        );
        assert_eq!(format_date_range(Some(start), None), "12 Mar 2026, 18:00");
        assert_eq!(format_date_range(None, None), "Date to be announced");
    }
}
