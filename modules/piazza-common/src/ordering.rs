//! Total order over events: status priority, then start time.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::status::{classify_event, EventStatus};
use crate::types::Event;

/// Priority for statuses outside the vocabulary (and missing ones).
pub const UNKNOWN_STATUS_PRIORITY: u8 = 50;

/// Which bucket numbering to use for concluded/past events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityScheme {
    /// Home feed, map list, following rails: concluded/past → 3.
    #[default]
    Feed,
    /// The personal "my events" rail: concluded/past → 9.
    Personal,
}

pub fn status_priority(status: Option<&str>, scheme: PriorityScheme) -> u8 {
    match status.and_then(EventStatus::parse) {
        Some(EventStatus::Ongoing) => 0,
        Some(EventStatus::Imminent) => 1,
        Some(EventStatus::Future) => 2,
        Some(EventStatus::Concluded | EventStatus::Past) => match scheme {
            PriorityScheme::Feed => 3,
            PriorityScheme::Personal => 9,
        },
        None => UNKNOWN_STATUS_PRIORITY,
    }
}

/// Sort key. `(priority, missing_start, start)` puts events without a
/// parseable start after every dated event of the same bucket.
fn sort_key(event: &Event, scheme: PriorityScheme) -> (u8, bool, Option<DateTime<Utc>>) {
    let start = event.start_at();
    (
        status_priority(event.status.as_deref(), scheme),
        start.is_none(),
        start,
    )
}

pub fn compare_events(a: &Event, b: &Event, scheme: PriorityScheme) -> Ordering {
    sort_key(a, scheme).cmp(&sort_key(b, scheme))
}

/// Stable in-place sort; equal keys keep their input order.
pub fn sort_events(events: &mut [Event], scheme: PriorityScheme) {
    events.sort_by_cached_key(|event| sort_key(event, scheme));
}

/// Fill in a derived status for every event that has none. Records carrying
/// an unrecognized status are left alone and sort last.
pub fn fill_missing_statuses(events: &mut [Event], now: DateTime<Utc>) {
    for event in events.iter_mut().filter(|e| e.status.is_none()) {
        event.status = Some(classify_event(event, now).as_str().to_string());
    }
}
