//! Event lifecycle status and the fallback classifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Event;

/// Canonical lifecycle vocabulary. `live` is accepted on input as an alias
/// for `ongoing` and never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Ongoing,
    Imminent,
    Future,
    Concluded,
    Past,
}

impl EventStatus {
    /// Normalize a raw status string. Returns `None` for anything outside the
    /// vocabulary.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "ongoing" | "live" => Some(Self::Ongoing),
            "imminent" => Some(Self::Imminent),
            "future" => Some(Self::Future),
            "concluded" => Some(Self::Concluded),
            "past" => Some(Self::Past),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Imminent => "imminent",
            Self::Future => "future",
            Self::Concluded => "concluded",
            Self::Past => "past",
        }
    }

    /// Human-facing label for cards and markers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ongoing => "Live now",
            Self::Imminent => "Starting soon",
            Self::Future => "Upcoming",
            Self::Concluded => "Concluded",
            Self::Past => "Past",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a status for an event.
///
/// A recognizable raw status is returned as-is (normalized). Otherwise:
/// 1. end in the past → `Past`
/// 2. start in the future → `Future`
/// 3. anything else → `Future`
///
/// `Ongoing` and `Imminent` are never derived; the server owns those.
pub fn classify(
    raw: Option<&str>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> EventStatus {
    if let Some(status) = raw.and_then(EventStatus::parse) {
        return status;
    }
    if end.is_some_and(|end| end < now) {
        return EventStatus::Past;
    }
    if start.is_some_and(|start| start > now) {
        return EventStatus::Future;
    }
    EventStatus::Future
}

pub fn classify_event(event: &Event, now: DateTime<Utc>) -> EventStatus {
    classify(event.status.as_deref(), event.start_at(), event.end_at(), now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn explicit_status_is_normalized() {
        assert_eq!(classify(Some("  ONGOING "), None, None, now()), EventStatus::Ongoing);
        assert_eq!(classify(Some("Imminent"), None, None, now()), EventStatus::Imminent);
    }

    #[test]
    fn live_is_an_alias_for_ongoing() {
        assert_eq!(EventStatus::parse("live"), Some(EventStatus::Ongoing));
        assert_eq!(EventStatus::Ongoing.as_str(), "ongoing");
    }

    #[test]
    fn invalid_status_falls_back_to_dates() {
        let end = now() - Duration::hours(1);
        assert_eq!(classify(Some("cancelled"), None, Some(end), now()), EventStatus::Past);
    }

    #[test]
    fn ended_event_is_past() {
        let start = now() - Duration::days(2);
        let end = now() - Duration::days(1);
        assert_eq!(classify(None, Some(start), Some(end), now()), EventStatus::Past);
    }

    #[test]
    fn upcoming_event_is_future() {
        let start = now() + Duration::days(3);
        assert_eq!(classify(None, Some(start), None, now()), EventStatus::Future);
    }

    #[test]
    fn running_event_without_status_is_still_future() {
        let start = now() - Duration::hours(1);
        let end = now() + Duration::hours(1);
        assert_eq!(classify(None, Some(start), Some(end), now()), EventStatus::Future);
    }

    #[test]
    fn no_information_defaults_to_future() {
        assert_eq!(classify(None, None, None, now()), EventStatus::Future);
    }

    #[test]
    fn classify_event_reads_date_fields() {
        let event = Event::new("e1", "Old fair")
            .with_field("end_at", serde_json::json!("2026-01-01T10:00:00Z"));
        assert_eq!(classify_event(&event, now()), EventStatus::Past);
    }
}
