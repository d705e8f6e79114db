// In-memory EventsApi for headless tests.
//
// Every call is recorded under a label of the form `method` or `method:arg`
// (`list_events:<n>` uses the 1-based call number). A label can be held with a
// oneshot gate to simulate a slow response, or marked as failing. Failure
// labels match either the full label or the bare method name.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use piazza_common::{Banner, Event, Message, RoomGrant};

use crate::traits::EventsApi;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build an `Event` from JSON, panicking on malformed fixtures.
pub fn event(value: Value) -> Event {
    serde_json::from_value(value).expect("fixture should deserialize as an Event")
}

#[derive(Default)]
pub struct MockApi {
    events: Mutex<Vec<Event>>,
    list_responses: Mutex<VecDeque<Vec<Event>>>,
    following: Mutex<Vec<Event>>,
    rooms: Mutex<HashMap<String, RoomGrant>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    banner: Mutex<Option<Banner>>,
    failures: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    calls: Mutex<Vec<String>>,
    list_count: Mutex<usize>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Builders ---

    pub fn with_events(self, events: Vec<Event>) -> Self {
        *lock(&self.events) = events;
        self
    }

    /// Responses handed out to successive `list_events` calls, in order.
    /// Once exhausted, calls fall back to `with_events`.
    pub fn with_list_responses(self, responses: Vec<Vec<Event>>) -> Self {
        *lock(&self.list_responses) = responses.into();
        self
    }

    pub fn with_following(self, events: Vec<Event>) -> Self {
        *lock(&self.following) = events;
        self
    }

    /// Rooms default to an open, writable `room-<event_id>`.
    pub fn with_room(self, event_id: &str, grant: RoomGrant) -> Self {
        lock(&self.rooms).insert(event_id.to_string(), grant);
        self
    }

    /// Append a message from someone else. Messages are stored newest first,
    /// so append them newest to oldest.
    pub fn with_message(self, room_id: &str, text: &str) -> Self {
        lock(&self.messages)
            .entry(room_id.to_string())
            .or_default()
            .push(Message {
                id: None,
                from_me: false,
                sender: Some("someone".into()),
                text: text.to_string(),
                created_at: None,
            });
        self
    }

    pub fn with_banner(self, banner: Banner) -> Self {
        *lock(&self.banner) = Some(banner);
        self
    }

    pub fn failing(self, label: &str) -> Self {
        self.fail(label);
        self
    }

    // --- Runtime controls ---

    pub fn fail(&self, label: &str) {
        lock(&self.failures).insert(label.to_string());
    }

    /// Hold calls with `label` until the returned sender fires (or is dropped).
    pub fn hold(&self, label: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.gates).insert(label.to_string(), rx);
        tx
    }

    /// Number of recorded calls matching `label` exactly or as a `label:` prefix.
    pub fn count(&self, label: &str) -> usize {
        let prefix = format!("{label}:");
        lock(&self.calls)
            .iter()
            .filter(|call| call.as_str() == label || call.starts_with(&prefix))
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    // --- Internals ---

    async fn enter(&self, method: &str, label: String) -> Result<()> {
        lock(&self.calls).push(label.clone());
        let gate = lock(&self.gates).remove(&label);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let failures = lock(&self.failures);
        if failures.contains(&label) || failures.contains(method) {
            bail!("mock failure: {label}");
        }
        Ok(())
    }

    fn find_event(&self, event_id: &str) -> Option<Event> {
        let events = lock(&self.events);
        let following = lock(&self.following);
        events
            .iter()
            .chain(following.iter())
            .find(|e| e.id == event_id)
            .cloned()
    }
}

#[async_trait]
impl EventsApi for MockApi {
    async fn list_events(&self) -> Result<Vec<Event>> {
        let n = {
            let mut count = lock(&self.list_count);
            *count += 1;
            *count
        };
        let response = lock(&self.list_responses)
            .pop_front()
            .unwrap_or_else(|| lock(&self.events).clone());
        self.enter("list_events", format!("list_events:{n}")).await?;
        Ok(response)
    }

    async fn get_event(&self, event_id: &str) -> Result<Event> {
        self.enter("get_event", format!("get_event:{event_id}")).await?;
        match self.find_event(event_id) {
            Some(event) => Ok(event),
            None => bail!("event {event_id} not found"),
        }
    }

    async fn list_following_events(&self) -> Result<Vec<Event>> {
        self.enter("list_following_events", "list_following_events".into())
            .await?;
        Ok(lock(&self.following).clone())
    }

    async fn open_or_join_room(&self, event_id: &str) -> Result<RoomGrant> {
        self.enter("open_or_join_room", format!("open_or_join_room:{event_id}"))
            .await?;
        let grant = lock(&self.rooms).get(event_id).cloned();
        Ok(grant.unwrap_or_else(|| RoomGrant {
            room_id: Some(format!("room-{event_id}")),
            can_send: true,
            title: None,
            active_from: None,
            active_until: None,
            locked: false,
        }))
    }

    async fn list_room_messages(&self, room_id: &str) -> Result<Vec<Message>> {
        self.enter("list_room_messages", format!("list_room_messages:{room_id}"))
            .await?;
        Ok(lock(&self.messages).get(room_id).cloned().unwrap_or_default())
    }

    async fn post_room_message(&self, room_id: &str, text: &str) -> Result<bool> {
        self.enter("post_room_message", format!("post_room_message:{room_id}"))
            .await?;
        lock(&self.messages).entry(room_id.to_string()).or_default().insert(
            0,
            Message {
                id: None,
                from_me: true,
                sender: None,
                text: text.to_string(),
                created_at: None,
            },
        );
        Ok(true)
    }

    async fn mark_room_read(&self, room_id: &str) -> Result<bool> {
        self.enter("mark_room_read", format!("mark_room_read:{room_id}"))
            .await?;
        Ok(true)
    }

    async fn join_event(&self, event_id: &str) -> Result<bool> {
        self.enter("join_event", format!("join_event:{event_id}")).await?;
        for event in lock(&self.following).iter_mut().chain(lock(&self.events).iter_mut()) {
            if event.id == event_id {
                event.joined = Some(true);
            }
        }
        Ok(true)
    }

    async fn get_active_banner(
        &self,
        placement: &str,
        _country: Option<&str>,
        _region: Option<&str>,
    ) -> Result<Option<Banner>> {
        self.enter("get_active_banner", format!("get_active_banner:{placement}"))
            .await?;
        Ok(lock(&self.banner).clone())
    }
}
