//! Map projection of the event set.
//!
//! `GeoMapProjector` owns every marker on its surface. Markers are keyed by
//! event id and rebuilt wholesale on each `update_from_events`; only
//! `add_private_events_if_missing` adds without clearing.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;

use piazza_common::{
    classify_event, format_date_range, Bounds, Event, EventStatus, GeoPoint, MapConfig,
};

use crate::surface::MapSurface;

/// Center and zoom of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    pub center: GeoPoint,
    pub zoom: u8,
    pub clustering: bool,
}

/// What the surface needs to draw one marker. Clicking it reports `event_id`
/// back to the host, which hands it to the selection controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub event_id: String,
    pub position: GeoPoint,
    pub status: EventStatus,
    pub color: &'static str,
    pub label_title: String,
    pub label_dates: String,
}

/// Legend colors. Past events never reach the map.
pub fn status_color(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Future => "#1e88e5",
        EventStatus::Imminent => "#fb8c00",
        EventStatus::Ongoing => "#43a047",
        EventStatus::Concluded | EventStatus::Past => "#757575",
    }
}

struct Marker {
    event: Event,
    position: GeoPoint,
}

pub struct GeoMapProjector<M: MapSurface> {
    surface: M,
    config: MapConfig,
    initialized: bool,
    markers: HashMap<String, Marker>,
}

impl<M: MapSurface> GeoMapProjector<M> {
    pub fn new(surface: M, config: MapConfig) -> Self {
        Self {
            surface,
            config,
            initialized: false,
            markers: HashMap::new(),
        }
    }

    /// Create the map at the default region-wide view. Safe to call again.
    pub fn init(&mut self) -> &M {
        if !self.initialized {
            let view = MapView {
                center: self.config.center,
                zoom: self.config.zoom,
                clustering: true,
            };
            self.surface.create(&view);
            self.initialized = true;
            tracing::debug!(lat = view.center.lat, lon = view.center.lon, zoom = view.zoom, "Map created");
        }
        &self.surface
    }

    /// Replace every marker with markers for `events`. Returns how many were placed.
    pub fn update_from_events(&mut self, events: &[Event]) -> usize {
        self.init();
        self.surface.clear_markers();
        self.markers.clear();

        let placed = events.iter().filter(|event| self.place(event)).count();
        tracing::debug!(events = events.len(), placed, "Map markers rebuilt");

        if placed > 0 {
            self.fit_to_markers();
        }
        placed
    }

    /// Add markers for events not already on the map, leaving the rest alone.
    pub fn add_private_events_if_missing(&mut self, events: &[Event]) -> usize {
        self.init();
        let mut added = 0;
        for event in events {
            if !self.markers.contains_key(&event.id) && self.place(event) {
                added += 1;
            }
        }
        tracing::debug!(added, "Private markers layered in");
        added
    }

    /// Pan/zoom to the marker for `event_id` and open its label. Returns
    /// `false` if there is no such marker.
    pub fn focus_on_event_id(&mut self, event_id: &str) -> bool {
        let Some(marker) = self.markers.get(event_id) else {
            tracing::debug!(event_id, "No marker to focus");
            return false;
        };
        let view = MapView {
            center: marker.position,
            zoom: self.surface.zoom().max(self.config.focus_min_zoom),
            clustering: true,
        };
        self.surface.set_view(&view);
        self.surface.open_label(event_id);
        true
    }

    pub fn marker_event(&self, event_id: &str) -> Option<&Event> {
        self.markers.get(event_id).map(|m| &m.event)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    fn place(&mut self, event: &Event) -> bool {
        let status = event
            .known_status()
            .unwrap_or_else(|| classify_event(event, Utc::now()));
        if status == EventStatus::Past {
            return false;
        }
        let Some(position) = event.coordinates() else {
            tracing::trace!(event_id = %event.id, "No usable coordinates, skipping");
            return false;
        };

        let spec = MarkerSpec {
            event_id: event.id.clone(),
            position,
            status,
            color: status_color(status),
            label_title: event.display_title().to_string(),
            label_dates: format_date_range(event.start_at(), event.end_at()),
        };
        self.surface.add_marker(&spec);
        self.markers.insert(
            event.id.clone(),
            Marker {
                event: event.clone(),
                position,
            },
        );
        true
    }

    fn fit_to_markers(&self) {
        let Some(bounds) = Bounds::from_points(self.markers.values().map(|m| &m.position)) else {
            return;
        };
        if let Err(err) = self.surface.fit_bounds(&bounds.padded(self.config.fit_padding)) {
            tracing::debug!(error = %err, "Could not fit map to markers");
        }
    }
}

/// Shared access to a projector for components that don't own it.
pub trait MapLink: Send + Sync {
    fn update_from_events(&self, events: &[Event]) -> usize;

    fn focus_on_event_id(&self, event_id: &str) -> bool;

    /// The event behind a clicked marker.
    fn marker_event(&self, event_id: &str) -> Option<Event>;
}

impl<M: MapSurface> MapLink for Mutex<GeoMapProjector<M>> {
    fn update_from_events(&self, events: &[Event]) -> usize {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update_from_events(events)
    }

    fn focus_on_event_id(&self, event_id: &str) -> bool {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .focus_on_event_id(event_id)
    }

    fn marker_event(&self, event_id: &str) -> Option<Event> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .marker_event(event_id)
            .cloned()
    }
}
