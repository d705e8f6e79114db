pub mod error;
pub mod types;

pub use error::{ApiError, Result};
pub use types::{Ack, Envelope, PostMessageInput};

use std::time::Duration;

use piazza_common::{id_string, Banner, Event, Message, RoomGrant};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Statuses the room endpoint uses to say "you may not enter".
const LOCKED_STATUSES: &[StatusCode] = &[StatusCode::FORBIDDEN, StatusCode::LOCKED];

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send a request and decode a JSON body, unwrapping a `data` envelope if present.
    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = self.authed(req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.into_inner())
    }

    /// Send a write request. An empty 2xx body counts as success.
    async fn acknowledge(&self, req: RequestBuilder) -> Result<bool> {
        let resp = self.authed(req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(true);
        }
        let ack: Ack = serde_json::from_str(&body)?;
        if !ack.ok {
            tracing::debug!(message = ?ack.message, "API declined write");
        }
        Ok(ack.ok)
    }

    /// Public event list for the home feed and the map.
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        let records: Vec<Value> = self.fetch(self.client.get(self.url("/api/events"))).await?;
        let events = decode_events(records);
        tracing::debug!(count = events.len(), "Fetched events");
        Ok(events)
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Event> {
        let url = self.url(&format!("/api/events/{event_id}"));
        self.fetch(self.client.get(url)).await
    }

    /// Events from followed organizers. Past events are already filtered out.
    pub async fn list_following_events(&self) -> Result<Vec<Event>> {
        let records: Vec<Value> = self
            .fetch(self.client.get(self.url("/api/following/events")))
            .await?;
        let events = decode_events(records);
        tracing::debug!(count = events.len(), "Fetched followed events");
        Ok(events)
    }

    /// Open the event's room, joining it if needed. Access-denied statuses come
    /// back as a locked grant rather than an error.
    pub async fn open_or_join_room(&self, event_id: &str) -> Result<RoomGrant> {
        let url = self.url(&format!("/api/events/{event_id}/room"));
        match self.fetch(self.client.post(url)).await {
            Err(ApiError::Api { status, message })
                if LOCKED_STATUSES.iter().any(|s| s.as_u16() == status) =>
            {
                tracing::info!(event_id, status, reason = %message, "Room locked");
                Ok(RoomGrant::locked())
            }
            other => other,
        }
    }

    /// Room messages, newest first.
    pub async fn list_room_messages(&self, room_id: &str) -> Result<Vec<Message>> {
        let url = self.url(&format!("/api/rooms/{room_id}/messages"));
        self.fetch(self.client.get(url)).await
    }

    pub async fn post_room_message(&self, room_id: &str, text: &str) -> Result<bool> {
        let url = self.url(&format!("/api/rooms/{room_id}/messages"));
        self.acknowledge(self.client.post(url).json(&PostMessageInput { text }))
            .await
    }

    pub async fn mark_room_read(&self, room_id: &str) -> Result<bool> {
        let url = self.url(&format!("/api/rooms/{room_id}/read"));
        self.acknowledge(self.client.post(url)).await
    }

    pub async fn join_event(&self, event_id: &str) -> Result<bool> {
        let url = self.url(&format!("/api/events/{event_id}/join"));
        self.acknowledge(self.client.post(url)).await
    }

    /// Active banner for a placement, `None` when nothing is scheduled.
    pub async fn get_active_banner(
        &self,
        placement: &str,
        country: Option<&str>,
        region: Option<&str>,
    ) -> Result<Option<Banner>> {
        let mut query = vec![("placement", placement)];
        if let Some(country) = country {
            query.push(("country", country));
        }
        if let Some(region) = region {
            query.push(("region", region));
        }
        let req = self.client.get(self.url("/api/banners/active")).query(&query);
        match self.fetch::<Value>(req).await {
            Ok(body) => decode_banner(body),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Decode list records one at a time. A record that does not decode is logged
/// and skipped so the rest of the list still renders.
fn decode_events(records: Vec<Value>) -> Vec<Event> {
    records
        .into_iter()
        .filter_map(|record| {
            let event_id = record
                .get("id")
                .or_else(|| record.get("_id"))
                .and_then(id_string);
            match serde_json::from_value::<Event>(record) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!(event_id = ?event_id, error = %err, "Skipping malformed event record");
                    None
                }
            }
        })
        .collect()
}

/// `null` (bare or wrapped) means no banner is running.
fn decode_banner(body: Value) -> Result<Option<Banner>> {
    match body {
        Value::Null => Ok(None),
        value => Ok(Some(serde_json::from_value(value)?)),
    }
}
