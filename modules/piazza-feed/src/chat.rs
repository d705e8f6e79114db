//! Polling chat session bound to one event room at a time.
//!
//! The session owns its poll task. Every open bumps a generation number and
//! aborts the previous task before the new request is issued; any result that
//! comes back carrying an older generation is dropped without touching the panel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use piazza_common::{ChatConfig, Message, RoomGrant};

use crate::notice::Notice;
use crate::surface::ChatPanel;
use crate::traits::EventsApi;

const DEFAULT_TITLE: &str = "Event chat";

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatLine {
    pub from_me: bool,
    pub sender: Option<String>,
    pub text: String,
    pub created_at: Option<String>,
}

impl From<Message> for ChatLine {
    fn from(message: Message) -> Self {
        Self {
            from_me: message.from_me,
            sender: message.sender,
            text: message.text,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChatPhase {
    Idle,
    Opening {
        event_id: String,
    },
    Active {
        event_id: String,
        room_id: String,
        can_send: bool,
        title: String,
    },
    Locked {
        event_id: String,
    },
    Failed {
        event_id: String,
    },
}

impl ChatPhase {
    pub fn event_id(&self) -> Option<&str> {
        match self {
            ChatPhase::Idle => None,
            ChatPhase::Opening { event_id }
            | ChatPhase::Active { event_id, .. }
            | ChatPhase::Locked { event_id }
            | ChatPhase::Failed { event_id } => Some(event_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenOutcome {
    Active,
    Locked,
    Failed,
    /// Another open (or a stop) happened while this one was in flight.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    Sent,
    /// Nothing to send, or the room does not accept messages.
    Skipped,
    Failed,
}

struct State {
    generation: u64,
    phase: ChatPhase,
    poller: Option<JoinHandle<()>>,
}

impl State {
    /// Invalidate everything in flight and cancel the poll task.
    fn advance(&mut self) -> u64 {
        self.generation += 1;
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        self.generation
    }
}

struct Shared<A, P> {
    api: Arc<A>,
    panel: P,
    config: ChatConfig,
    state: Mutex<State>,
}

impl<A: EventsApi, P: ChatPanel> Shared<A, P> {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch, reverse and render the room's messages, then mark it read.
    /// Returns `false` once `generation` is stale.
    async fn sync_room(&self, generation: u64, room_id: &str) -> bool {
        let fetched = self.api.list_room_messages(room_id).await;
        {
            let state = self.lock();
            if state.generation != generation {
                return false;
            }
            match fetched {
                Ok(mut messages) => {
                    messages.reverse();
                    let lines: Vec<ChatLine> = messages.into_iter().map(ChatLine::from).collect();
                    self.panel.render_messages(&lines);
                    self.panel.scroll_to_latest();
                }
                Err(err) => {
                    warn!(room_id, error = %err, "Failed to refresh room messages");
                    self.panel.show_notice(Some(&Notice::error(
                        "Could not refresh messages",
                        self.config.notice_ttl,
                    )));
                    return true;
                }
            }
        }

        if let Err(err) = self.api.mark_room_read(room_id).await {
            debug!(room_id, error = %err, "Failed to mark room read");
        }
        true
    }
}

async fn poll_room<A, P>(shared: Weak<Shared<A, P>>, generation: u64, room_id: String, period: Duration)
where
    A: EventsApi,
    P: ChatPanel,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.sync_room(generation, &room_id).await {
            break;
        }
    }
    debug!(room_id = %room_id, generation, "Room poller finished");
}

/// Owns at most one room subscription and its poll task.
pub struct ChatPollingSession<A: EventsApi + 'static, P: ChatPanel + 'static> {
    shared: Arc<Shared<A, P>>,
}

impl<A: EventsApi + 'static, P: ChatPanel + 'static> ChatPollingSession<A, P> {
    pub fn new(api: Arc<A>, panel: P, config: ChatConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                panel,
                config,
                state: Mutex::new(State {
                    generation: 0,
                    phase: ChatPhase::Idle,
                    poller: None,
                }),
            }),
        }
    }

    pub fn phase(&self) -> ChatPhase {
        self.shared.lock().phase.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.shared
            .lock()
            .poller
            .as_ref()
            .is_some_and(|poller| !poller.is_finished())
    }

    pub fn panel(&self) -> &P {
        &self.shared.panel
    }

    /// Bind the session to `event_id`'s room. Any previous room stops polling
    /// before the open request goes out.
    pub async fn open_for_event(&self, event_id: &str, title_hint: Option<&str>) -> OpenOutcome {
        let shared = &self.shared;
        let generation = {
            let mut state = shared.lock();
            let generation = state.advance();
            state.phase = ChatPhase::Opening {
                event_id: event_id.to_string(),
            };
            shared.panel.set_title(title_hint.unwrap_or(DEFAULT_TITLE));
            shared.panel.set_composer_enabled(false);
            shared.panel.render_messages(&[]);
            shared.panel.show_notice(Some(&Notice::loading("Opening chat...")));
            generation
        };

        let result = shared.api.open_or_join_room(event_id).await;

        let room_id = {
            let mut state = shared.lock();
            if state.generation != generation {
                debug!(event_id, generation, "Discarding superseded room open");
                return OpenOutcome::Superseded;
            }

            let grant = match result {
                Ok(grant) => grant,
                Err(err) => {
                    warn!(event_id, error = %err, "Failed to open room");
                    state.phase = ChatPhase::Failed {
                        event_id: event_id.to_string(),
                    };
                    shared.panel.show_notice(Some(&Notice::error(
                        "Could not open the chat",
                        shared.config.notice_ttl,
                    )));
                    return OpenOutcome::Failed;
                }
            };

            let Some(room_id) = grant.room_id.clone().filter(|_| !grant.locked) else {
                info!(event_id, "Room is locked");
                state.phase = ChatPhase::Locked {
                    event_id: event_id.to_string(),
                };
                shared.panel.show_notice(Some(&Notice::locked(locked_text(&grant))));
                return OpenOutcome::Locked;
            };

            let title = grant
                .title
                .clone()
                .or_else(|| title_hint.map(str::to_string))
                .unwrap_or_else(|| DEFAULT_TITLE.to_string());
            shared.panel.set_title(&title);
            shared.panel.show_notice(None);
            shared.panel.set_composer_enabled(grant.can_send);

            state.poller = Some(tokio::spawn(poll_room(
                Arc::downgrade(shared),
                generation,
                room_id.clone(),
                shared.config.poll_interval,
            )));
            state.phase = ChatPhase::Active {
                event_id: event_id.to_string(),
                room_id: room_id.clone(),
                can_send: grant.can_send,
                title,
            };
            info!(event_id, room_id = %room_id, can_send = grant.can_send, "Room opened");
            room_id
        };

        shared.sync_room(generation, &room_id).await;
        OpenOutcome::Active
    }

    /// Run one fetch-render cycle now. Returns `false` when no room is active.
    pub async fn refresh(&self) -> bool {
        let (generation, room_id) = {
            let state = self.shared.lock();
            match &state.phase {
                ChatPhase::Active { room_id, .. } => (state.generation, room_id.clone()),
                _ => return false,
            }
        };
        self.shared.sync_room(generation, &room_id).await
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Skipped;
        }
        let (generation, room_id) = {
            let state = self.shared.lock();
            match &state.phase {
                ChatPhase::Active {
                    room_id,
                    can_send: true,
                    ..
                } => (state.generation, room_id.clone()),
                _ => return SendOutcome::Skipped,
            }
        };

        let posted = self.shared.api.post_room_message(&room_id, text).await;
        {
            let state = self.shared.lock();
            if state.generation != generation {
                debug!(room_id = %room_id, "Room changed while sending");
                return match posted {
                    Ok(true) => SendOutcome::Sent,
                    _ => SendOutcome::Failed,
                };
            }
            match posted {
                Ok(true) => self.shared.panel.clear_input(),
                Ok(false) => {
                    warn!(room_id = %room_id, "Message rejected");
                    self.shared.panel.show_notice(Some(&Notice::error(
                        "Message not sent",
                        self.shared.config.notice_ttl,
                    )));
                    return SendOutcome::Failed;
                }
                Err(err) => {
                    warn!(room_id = %room_id, error = %err, "Failed to send message");
                    self.shared.panel.show_notice(Some(&Notice::error(
                        "Message not sent",
                        self.shared.config.notice_ttl,
                    )));
                    return SendOutcome::Failed;
                }
            }
        }

        self.shared.sync_room(generation, &room_id).await;
        SendOutcome::Sent
    }

    /// Stop polling and unbind the room. Safe to call any number of times.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        state.advance();
        if state.phase != ChatPhase::Idle {
            debug!(event_id = ?state.phase.event_id(), "Chat session stopped");
            state.phase = ChatPhase::Idle;
            self.shared.panel.set_composer_enabled(false);
        }
    }
}

impl<A: EventsApi + 'static, P: ChatPanel + 'static> Drop for ChatPollingSession<A, P> {
    fn drop(&mut self) {
        self.shared.lock().advance();
    }
}

fn locked_text(grant: &RoomGrant) -> String {
    match (&grant.active_from, &grant.active_until) {
        (Some(from), Some(until)) => format!("The chat is open from {from} to {until}"),
        (Some(from), None) => format!("The chat opens at {from}"),
        _ => "You don't have access to this chat".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessChat;
    use crate::notice::NoticeKind;
    use crate::testing::MockApi;

    fn session(api: &Arc<MockApi>) -> (ChatPollingSession<MockApi, HeadlessChat>, HeadlessChat) {
        let panel = HeadlessChat::default();
        (
            ChatPollingSession::new(api.clone(), panel.clone(), ChatConfig::default()),
            panel,
        )
    }

    #[tokio::test]
    async fn open_renders_messages_oldest_first() {
        let api = Arc::new(
            MockApi::new()
                .with_message("room-e1", "second")
                .with_message("room-e1", "first"),
        );
        let (chat, panel) = session(&api);

        assert_eq!(chat.open_for_event("e1", Some("Sagra")).await, OpenOutcome::Active);

        let state = panel.snapshot();
        let texts: Vec<&str> = state.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(state.title.as_deref(), Some("Sagra"));
        assert!(state.composer_enabled);
        assert!(state.notice.is_none());
        assert_eq!(state.scroll_count, 1);
        assert_eq!(api.count("mark_room_read:room-e1"), 1);
        assert!(chat.is_polling());
    }

    #[tokio::test]
    async fn read_only_room_keeps_composer_disabled() {
        let api = Arc::new(MockApi::new().with_room(
            "e1",
            RoomGrant {
                room_id: Some("r1".into()),
                can_send: false,
                title: Some("Announcements".into()),
                active_from: None,
                active_until: None,
                locked: false,
            },
        ));
        let (chat, panel) = session(&api);

        assert_eq!(chat.open_for_event("e1", None).await, OpenOutcome::Active);
        assert!(!panel.snapshot().composer_enabled);
        assert_eq!(panel.snapshot().title.as_deref(), Some("Announcements"));
        assert_eq!(chat.send("hello").await, SendOutcome::Skipped);
        assert_eq!(api.count("post_room_message"), 0);
    }

    #[tokio::test]
    async fn locked_room_shows_persistent_notice_and_never_polls() {
        let api = Arc::new(MockApi::new().with_room("e1", RoomGrant::locked()));
        let (chat, panel) = session(&api);

        assert_eq!(chat.open_for_event("e1", None).await, OpenOutcome::Locked);

        let notice = panel.snapshot().notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Locked);
        assert!(notice.is_persistent());
        assert!(!panel.snapshot().composer_enabled);
        assert!(!chat.is_polling());
        assert_eq!(api.count("list_room_messages"), 0);
    }

    #[tokio::test]
    async fn failed_open_shows_transient_error() {
        let api = Arc::new(MockApi::new().failing("open_or_join_room"));
        let (chat, panel) = session(&api);

        assert_eq!(chat.open_for_event("e1", None).await, OpenOutcome::Failed);
        assert_eq!(chat.phase(), ChatPhase::Failed { event_id: "e1".into() });
        let notice = panel.snapshot().notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(!notice.is_persistent());
        assert!(!chat.is_polling());
    }

    #[tokio::test]
    async fn blank_send_makes_no_call() {
        let api = Arc::new(MockApi::new());
        let (chat, panel) = session(&api);
        chat.open_for_event("e1", None).await;
        let before = panel.snapshot();

        assert_eq!(chat.send("   \n\t").await, SendOutcome::Skipped);

        assert_eq!(api.count("post_room_message"), 0);
        let after = panel.snapshot();
        assert_eq!(after.render_count, before.render_count);
        assert_eq!(after.input_cleared, 0);
    }

    #[tokio::test]
    async fn send_clears_input_and_refreshes_immediately() {
        let api = Arc::new(MockApi::new());
        let (chat, panel) = session(&api);
        chat.open_for_event("e1", None).await;

        assert_eq!(chat.send("  ciao  ").await, SendOutcome::Sent);

        let state = panel.snapshot();
        assert_eq!(state.input_cleared, 1);
        assert_eq!(state.lines.last().map(|l| l.text.as_str()), Some("ciao"));
        assert!(state.lines.last().unwrap().from_me);
        assert_eq!(api.count("list_room_messages:room-e1"), 2);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let api = Arc::new(MockApi::new());
        let (chat, _panel) = session(&api);
        chat.open_for_event("e1", None).await;

        chat.stop();
        chat.stop();

        assert_eq!(chat.phase(), ChatPhase::Idle);
        assert!(!chat.is_polling());
        assert!(!chat.refresh().await);
    }
}
