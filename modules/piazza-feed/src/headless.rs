//! In-memory rendering adapters.
//!
//! Each adapter records what it was asked to draw. Handles are `Clone` and
//! share state, so the host keeps one copy to inspect while the component
//! owns another. The CLI prints these snapshots; tests assert on them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use serde::Serialize;

use piazza_common::{Banner, Bounds};

use crate::cards::EventCard;
use crate::chat::ChatLine;
use crate::following::{OrganizerRail, RailSlot};
use crate::home::HomeFeed;
use crate::map::{MapView, MarkerSpec};
use crate::notice::Notice;
use crate::surface::{ChatPanel, DetailPanel, FeedSink, MapSurface, RailSink};

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct MapState {
    pub create_count: u32,
    pub view: Option<MapView>,
    pub markers: BTreeMap<String, MarkerSpec>,
    pub fitted: Option<Bounds>,
    pub open_label: Option<String>,
    #[serde(skip)]
    fail_fit: bool,
}

#[derive(Clone, Default)]
pub struct HeadlessMap {
    state: Arc<Mutex<MapState>>,
}

impl HeadlessMap {
    pub fn snapshot(&self) -> MapState {
        lock(&self.state).clone()
    }

    /// Make `fit_bounds` fail, as a zero-sized widget would.
    pub fn fail_fit(&self, fail: bool) {
        lock(&self.state).fail_fit = fail;
    }
}

impl MapSurface for HeadlessMap {
    fn create(&self, view: &MapView) {
        let mut state = lock(&self.state);
        state.create_count += 1;
        state.view = Some(*view);
    }

    fn add_marker(&self, marker: &MarkerSpec) {
        lock(&self.state)
            .markers
            .insert(marker.event_id.clone(), marker.clone());
    }

    fn clear_markers(&self) {
        let mut state = lock(&self.state);
        state.markers.clear();
        state.open_label = None;
    }

    fn fit_bounds(&self, bounds: &Bounds) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_fit {
            bail!("map container has no size");
        }
        state.fitted = Some(*bounds);
        if let Some(view) = state.view.as_mut() {
            view.center = bounds.center();
        }
        Ok(())
    }

    fn zoom(&self) -> u8 {
        lock(&self.state).view.map(|v| v.zoom).unwrap_or(0)
    }

    fn set_view(&self, view: &MapView) {
        lock(&self.state).view = Some(*view);
    }

    fn open_label(&self, event_id: &str) {
        lock(&self.state).open_label = Some(event_id.to_string());
    }
}

// ---------------------------------------------------------------------------
// Detail panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetailState {
    pub card: Option<EventCard>,
    pub visible: bool,
    pub show_count: u32,
}

#[derive(Clone, Default)]
pub struct HeadlessDetail {
    state: Arc<Mutex<DetailState>>,
}

impl HeadlessDetail {
    pub fn snapshot(&self) -> DetailState {
        lock(&self.state).clone()
    }
}

impl DetailPanel for HeadlessDetail {
    fn show(&self, card: &EventCard) {
        let mut state = lock(&self.state);
        state.card = Some(card.clone());
        state.visible = true;
        state.show_count += 1;
    }

    fn hide(&self) {
        lock(&self.state).visible = false;
    }
}

// ---------------------------------------------------------------------------
// Chat panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatState {
    pub title: Option<String>,
    pub notice: Option<Notice>,
    pub composer_enabled: bool,
    pub lines: Vec<ChatLine>,
    pub render_count: u32,
    pub scroll_count: u32,
    pub input_cleared: u32,
}

#[derive(Clone, Default)]
pub struct HeadlessChat {
    state: Arc<Mutex<ChatState>>,
}

impl HeadlessChat {
    pub fn snapshot(&self) -> ChatState {
        lock(&self.state).clone()
    }
}

impl ChatPanel for HeadlessChat {
    fn set_title(&self, title: &str) {
        lock(&self.state).title = Some(title.to_string());
    }

    fn show_notice(&self, notice: Option<&Notice>) {
        lock(&self.state).notice = notice.cloned();
    }

    fn set_composer_enabled(&self, enabled: bool) {
        lock(&self.state).composer_enabled = enabled;
    }

    fn render_messages(&self, lines: &[ChatLine]) {
        let mut state = lock(&self.state);
        state.lines = lines.to_vec();
        state.render_count += 1;
    }

    fn scroll_to_latest(&self) {
        lock(&self.state).scroll_count += 1;
    }

    fn clear_input(&self) {
        lock(&self.state).input_cleared += 1;
    }
}

// ---------------------------------------------------------------------------
// Home feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedState {
    pub feed: Option<HomeFeed>,
    pub render_count: u32,
    /// Notice currently on screen.
    pub notice: Option<Notice>,
    pub notices_shown: u32,
}

#[derive(Clone, Default)]
pub struct HeadlessFeed {
    state: Arc<Mutex<FeedState>>,
}

impl HeadlessFeed {
    pub fn snapshot(&self) -> FeedState {
        lock(&self.state).clone()
    }
}

impl FeedSink for HeadlessFeed {
    fn render_feed(&self, feed: &HomeFeed) {
        let mut state = lock(&self.state);
        state.feed = Some(feed.clone());
        state.render_count += 1;
    }

    fn show_notice(&self, notice: Option<&Notice>) {
        let mut state = lock(&self.state);
        if notice.is_some() {
            state.notices_shown += 1;
        }
        state.notice = notice.cloned();
    }
}

// ---------------------------------------------------------------------------
// Following rails
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct RailState {
    pub rails: Vec<OrganizerRail>,
    pub render_count: u32,
    pub notices: Vec<Notice>,
}

#[derive(Clone, Default)]
pub struct HeadlessRails {
    state: Arc<Mutex<RailState>>,
}

impl HeadlessRails {
    pub fn snapshot(&self) -> RailState {
        lock(&self.state).clone()
    }
}

impl RailSink for HeadlessRails {
    fn render_rails(&self, rails: &[OrganizerRail]) {
        let mut state = lock(&self.state);
        state.rails = rails.to_vec();
        state.render_count += 1;
    }

    fn fill_sponsored(&self, rail_key: &str, banner: &Banner) {
        let mut state = lock(&self.state);
        let slots = state
            .rails
            .iter_mut()
            .filter(|rail| rail.organizer_id == rail_key)
            .flat_map(|rail| rail.slots.iter_mut());
        for slot in slots {
            if let RailSlot::Sponsored { banner: filled } = slot {
                *filled = Some(banner.clone());
            }
        }
    }

    fn show_notice(&self, notice: &Notice) {
        lock(&self.state).notices.push(notice.clone());
    }
}
