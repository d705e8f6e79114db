//! Which event is focused, kept consistent across the map, the detail panel
//! and the chat panel.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use piazza_common::{ChatConfig, Event};

use crate::cards::EventCard;
use crate::chat::{ChatPhase, ChatPollingSession, OpenOutcome};
use crate::context::ViewerContext;
use crate::map::MapLink;
use crate::surface::{ChatPanel, DetailPanel};
use crate::traits::EventsApi;

pub struct SelectionController<A, D, P>
where
    A: EventsApi + 'static,
    D: DetailPanel,
    P: ChatPanel + 'static,
{
    api: Arc<A>,
    detail: D,
    chat: ChatPollingSession<A, P>,
    map: Option<Arc<dyn MapLink>>,
    ctx: ViewerContext,
    selected: Mutex<Option<String>>,
}

impl<A, D, P> SelectionController<A, D, P>
where
    A: EventsApi + 'static,
    D: DetailPanel,
    P: ChatPanel + 'static,
{
    pub fn new(api: Arc<A>, detail: D, chat_panel: P, chat_config: ChatConfig, ctx: ViewerContext) -> Self {
        let chat = ChatPollingSession::new(api.clone(), chat_panel, chat_config);
        Self {
            api,
            detail,
            chat,
            map: None,
            ctx,
            selected: Mutex::new(None),
        }
    }

    pub fn with_map(mut self, map: Arc<dyn MapLink>) -> Self {
        self.map = Some(map);
        self
    }

    pub fn selected_event_id(&self) -> Option<String> {
        self.selected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn chat(&self) -> &ChatPollingSession<A, P> {
        &self.chat
    }

    pub fn detail(&self) -> &D {
        &self.detail
    }

    /// Show `event` in the detail panel, focus its marker, and bind the chat
    /// to its room.
    ///
    /// Selecting the event that is already bound re-renders the card and
    /// refocuses the map but leaves the running chat alone, unless the last
    /// open failed. Returns the chat outcome when a room open was attempted.
    pub async fn select(&self, event: &Event) -> Option<OpenOutcome> {
        self.detail.show(&EventCard::from_event(event, &self.ctx));
        if let Some(map) = &self.map {
            map.focus_on_event_id(&event.id);
        }
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = Some(event.id.clone());

        let phase = self.chat.phase();
        let already_bound =
            phase.event_id() == Some(event.id.as_str()) && !matches!(phase, ChatPhase::Failed { .. });
        if already_bound {
            debug!(event_id = %event.id, "Event already selected");
            return None;
        }

        info!(event_id = %event.id, "Event selected");
        Some(self.chat.open_for_event(&event.id, Some(event.display_title())).await)
    }

    /// Marker click from the map surface.
    pub async fn on_marker_click(&self, event_id: &str) -> Option<OpenOutcome> {
        let event = self.map.as_ref()?.marker_event(event_id)?;
        self.select(&event).await
    }

    /// Hide the detail card. The chat keeps running.
    pub fn close_detail(&self) {
        self.detail.hide();
    }

    /// Re-select a hinted event after navigating back. Best-effort: a failed
    /// fetch is logged and leaves the page as it is.
    pub async fn restore(&self, hint: Option<&str>) -> bool {
        let Some(event_id) = hint.map(str::trim).filter(|id| !id.is_empty()) else {
            return false;
        };
        match self.api.get_event(event_id).await {
            Ok(event) => {
                self.select(&event).await;
                true
            }
            Err(err) => {
                warn!(event_id, error = %err, "Could not restore selection");
                false
            }
        }
    }

    pub fn stop(&self) {
        self.chat.stop();
    }
}
