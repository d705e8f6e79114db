//! Followed events, one rail per organizer.
//!
//! Rails are keyed by organizer id and ordered by display name. Each rail
//! carries one sponsored slot after its first card; the slot is filled later
//! and independently, and stays an empty placeholder if that fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use piazza_common::{fill_missing_statuses, sort_events, Banner, BannerScope, Event, PriorityScheme};

use crate::cards::EventCard;
use crate::context::ViewerContext;
use crate::notice::Notice;
use crate::surface::RailSink;
use crate::traits::EventsApi;

pub const UNKNOWN_ORGANIZER_ID: &str = "unknown";
pub const UNKNOWN_ORGANIZER_LABEL: &str = "Other organizers";

/// Position of the sponsored slot within a rail.
const SPONSORED_SLOT_AFTER: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardAction {
    Join,
    Participating,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RailCard {
    pub card: EventCard,
    pub action: CardAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RailSlot {
    Card(RailCard),
    Sponsored { banner: Option<Banner> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizerRail {
    pub organizer_id: String,
    pub organizer_name: String,
    pub slots: Vec<RailSlot>,
}

impl OrganizerRail {
    pub fn cards(&self) -> impl Iterator<Item = &RailCard> {
        self.slots.iter().filter_map(|slot| match slot {
            RailSlot::Card(card) => Some(card),
            RailSlot::Sponsored { .. } => None,
        })
    }

    pub fn event_ids(&self) -> Vec<&str> {
        self.cards().map(|c| c.card.event_id.as_str()).collect()
    }
}

struct Group {
    id: String,
    name: Option<String>,
    events: Vec<Event>,
}

/// Partition `events` into organizer rails.
pub fn group_by_organizer(events: &[Event], ctx: &ViewerContext, now: DateTime<Utc>) -> Vec<OrganizerRail> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for event in events {
        let organizer = event.organizer_ref();
        let id = organizer
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ORGANIZER_ID.to_string());
        let name = organizer
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let slot = *index.entry(id.clone()).or_insert_with(|| {
            groups.push(Group {
                id,
                name: None,
                events: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        if group.name.is_none() {
            group.name = name;
        }
        group.events.push(event.clone());
    }

    let mut rails: Vec<OrganizerRail> = groups.into_iter().map(|g| build_rail(g, ctx, now)).collect();
    rails.sort_by(|a, b| {
        collation_key(&a.organizer_name)
            .cmp(&collation_key(&b.organizer_name))
            .then_with(|| a.organizer_name.cmp(&b.organizer_name))
    });
    rails
}

fn build_rail(mut group: Group, ctx: &ViewerContext, now: DateTime<Utc>) -> OrganizerRail {
    sort_events(&mut group.events, PriorityScheme::Feed);

    let mut slots: Vec<RailSlot> = group
        .events
        .iter()
        .map(|event| {
            let card = EventCard::at(event, ctx, now);
            let action = if card.joined {
                CardAction::Participating
            } else {
                CardAction::Join
            };
            RailSlot::Card(RailCard { card, action })
        })
        .collect();
    slots.insert(SPONSORED_SLOT_AFTER.min(slots.len()), RailSlot::Sponsored { banner: None });

    let organizer_name = group.name.unwrap_or_else(|| UNKNOWN_ORGANIZER_LABEL.to_string());
    OrganizerRail {
        organizer_id: group.id,
        organizer_name,
        slots,
    }
}

/// Case- and accent-insensitive sort key for display names.
fn collation_key(name: &str) -> String {
    name.chars().flat_map(char::to_lowercase).map(fold_accent).collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

// ---------------------------------------------------------------------------
// FollowingFeed
// ---------------------------------------------------------------------------

/// The "following" page: loads followed events, renders rails, fills
/// sponsored slots, and handles join clicks.
pub struct FollowingFeed<A: EventsApi, R: RailSink> {
    api: Arc<A>,
    sink: R,
    ctx: ViewerContext,
    scope: BannerScope,
    notice_ttl: Duration,
    events: Mutex<Vec<Event>>,
    banners: Mutex<HashMap<String, Banner>>,
}

impl<A: EventsApi, R: RailSink> FollowingFeed<A, R> {
    pub fn new(api: Arc<A>, sink: R, ctx: ViewerContext, scope: BannerScope, notice_ttl: Duration) -> Self {
        Self {
            api,
            sink,
            ctx,
            scope,
            notice_ttl,
            events: Mutex::new(Vec::new()),
            banners: Mutex::new(HashMap::new()),
        }
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    /// Fetch followed events and render them. Returns the number of rails.
    pub async fn load(&self) -> usize {
        let mut events = match self.api.list_following_events().await {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "Failed to load followed events");
                self.sink.show_notice(&Notice::error(
                    "Could not load followed events",
                    self.notice_ttl,
                ));
                return 0;
            }
        };
        fill_missing_statuses(&mut events, Utc::now());
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = events;
        self.banners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let rails = self.render();
        self.fill_banners(&rails).await;
        info!(rails = rails.len(), "Following feed rendered");
        rails.len()
    }

    /// Join `event_id` and flip its card to "participating".
    pub async fn join(&self, event_id: &str) -> bool {
        match self.api.join_event(event_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(event_id, "Join rejected");
                self.sink
                    .show_notice(&Notice::error("Could not join the event", self.notice_ttl));
                return false;
            }
            Err(err) => {
                warn!(event_id, error = %err, "Failed to join event");
                self.sink
                    .show_notice(&Notice::error("Could not join the event", self.notice_ttl));
                return false;
            }
        }

        {
            let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
            for event in events.iter_mut().filter(|e| e.id == event_id) {
                event.joined = Some(true);
            }
        }
        self.render();
        let banners = self
            .banners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (rail_key, banner) in &banners {
            self.sink.fill_sponsored(rail_key, banner);
        }
        self.sink
            .show_notice(&Notice::info("You're in!", self.notice_ttl));
        info!(event_id, "Joined event");
        true
    }

    fn render(&self) -> Vec<OrganizerRail> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let rails = group_by_organizer(&events, &self.ctx, Utc::now());
        self.sink.render_rails(&rails);
        rails
    }

    async fn fill_banners(&self, rails: &[OrganizerRail]) {
        let scope = &self.scope;
        let fetches = rails.iter().map(|rail| async move {
            let result = self
                .api
                .get_active_banner(&scope.placement, scope.country.as_deref(), scope.region.as_deref())
                .await;
            (rail.organizer_id.as_str(), result)
        });

        for (rail_key, result) in join_all(fetches).await {
            match result {
                Ok(Some(banner)) => {
                    self.sink.fill_sponsored(rail_key, &banner);
                    self.banners
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(rail_key.to_string(), banner);
                }
                Ok(None) => debug!(rail_key, "No active banner"),
                Err(err) => warn!(rail_key, error = %err, "Failed to fetch banner"),
            }
        }
    }
}
