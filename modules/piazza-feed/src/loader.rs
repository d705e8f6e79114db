use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use piazza_common::{fill_missing_statuses, Event};

use crate::context::ViewerContext;
use crate::home::build_home_feed;
use crate::map::MapLink;
use crate::notice::Notice;
use crate::surface::FeedSink;
use crate::traits::EventsApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    Applied { count: usize },
    /// A later load was issued before this one returned.
    Superseded,
    Failed,
}

/// Loads the event list into the home feed (and the map, when attached).
/// Only the most recently issued load is ever applied.
pub struct FeedLoader<A: EventsApi, S: FeedSink> {
    api: Arc<A>,
    sink: S,
    ctx: ViewerContext,
    map: Option<Arc<dyn MapLink>>,
    notice_ttl: Duration,
    generation: AtomicU64,
    applied: Mutex<Vec<Event>>,
}

impl<A: EventsApi, S: FeedSink> FeedLoader<A, S> {
    pub fn new(api: Arc<A>, sink: S, ctx: ViewerContext, notice_ttl: Duration) -> Self {
        Self {
            api,
            sink,
            ctx,
            map: None,
            notice_ttl,
            generation: AtomicU64::new(0),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn with_map(mut self, map: Arc<dyn MapLink>) -> Self {
        self.map = Some(map);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Events from the last applied load, statuses filled in.
    pub fn events(&self) -> Vec<Event> {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn load_events(&self) -> LoadOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.sink.show_notice(Some(&Notice::loading("Loading events...")));

        let result = self.api.list_events().await;

        // Held across the check and the render so two completions can't interleave.
        let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Discarding superseded event load");
            return LoadOutcome::Superseded;
        }

        match result {
            Ok(mut events) => {
                let now = Utc::now();
                fill_missing_statuses(&mut events, now);
                let feed = build_home_feed(&events, &self.ctx, now);
                self.sink.render_feed(&feed);
                self.sink.show_notice(None);
                if let Some(map) = &self.map {
                    map.update_from_events(&events);
                }
                let count = events.len();
                *applied = events;
                info!(generation, count, "Event feed applied");
                LoadOutcome::Applied { count }
            }
            Err(err) => {
                warn!(generation, error = %err, "Failed to load events");
                self.sink
                    .show_notice(Some(&Notice::error("Could not load events", self.notice_ttl)));
                LoadOutcome::Failed
            }
        }
    }
}
