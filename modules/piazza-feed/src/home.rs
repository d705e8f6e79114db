use chrono::{DateTime, Utc};
use serde::Serialize;

use piazza_common::{sort_events, Event, PriorityScheme};

use crate::cards::EventCard;
use crate::context::ViewerContext;

/// The home surface: the main ordered card list plus the viewer's own rail.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HomeFeed {
    pub cards: Vec<EventCard>,
    /// Events the viewer participates in, concluded ones pushed to the end.
    pub my_events: Vec<EventCard>,
}

impl HomeFeed {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Build the home feed from events whose statuses are already resolved.
pub fn build_home_feed(events: &[Event], ctx: &ViewerContext, now: DateTime<Utc>) -> HomeFeed {
    let mut ordered = events.to_vec();
    sort_events(&mut ordered, PriorityScheme::Feed);

    let mut mine: Vec<Event> = events
        .iter()
        .filter(|e| e.is_joined_by(ctx.user_id()))
        .cloned()
        .collect();
    sort_events(&mut mine, PriorityScheme::Personal);

    HomeFeed {
        cards: ordered.iter().map(|e| EventCard::at(e, ctx, now)).collect(),
        my_events: mine.iter().map(|e| EventCard::at(e, ctx, now)).collect(),
    }
}
