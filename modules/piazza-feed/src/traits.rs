// Trait seam for the external events API.
//
// EventsApi covers every call the view core makes. ApiClient implements it for
// production; testing::MockApi implements it for headless tests with no network.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use piazza_client::ApiClient;
use piazza_common::{Banner, Event, Message, RoomGrant};

#[async_trait]
pub trait EventsApi: Send + Sync {
    async fn list_events(&self) -> Result<Vec<Event>>;

    async fn get_event(&self, event_id: &str) -> Result<Event>;

    /// Followed events, `past` already excluded, organizer populated.
    async fn list_following_events(&self) -> Result<Vec<Event>>;

    async fn open_or_join_room(&self, event_id: &str) -> Result<RoomGrant>;

    /// Newest first.
    async fn list_room_messages(&self, room_id: &str) -> Result<Vec<Message>>;

    async fn post_room_message(&self, room_id: &str, text: &str) -> Result<bool>;

    async fn mark_room_read(&self, room_id: &str) -> Result<bool>;

    async fn join_event(&self, event_id: &str) -> Result<bool>;

    async fn get_active_banner(
        &self,
        placement: &str,
        country: Option<&str>,
        region: Option<&str>,
    ) -> Result<Option<Banner>>;
}

#[async_trait]
impl EventsApi for ApiClient {
    async fn list_events(&self) -> Result<Vec<Event>> {
        Ok(self.list_events().await?)
    }

    async fn get_event(&self, event_id: &str) -> Result<Event> {
        Ok(self.get_event(event_id).await?)
    }

    async fn list_following_events(&self) -> Result<Vec<Event>> {
        Ok(self.list_following_events().await?)
    }

    async fn open_or_join_room(&self, event_id: &str) -> Result<RoomGrant> {
        Ok(self.open_or_join_room(event_id).await?)
    }

    async fn list_room_messages(&self, room_id: &str) -> Result<Vec<Message>> {
        Ok(self.list_room_messages(room_id).await?)
    }

    async fn post_room_message(&self, room_id: &str, text: &str) -> Result<bool> {
        Ok(self.post_room_message(room_id, text).await?)
    }

    async fn mark_room_read(&self, room_id: &str) -> Result<bool> {
        Ok(self.mark_room_read(room_id).await?)
    }

    async fn join_event(&self, event_id: &str) -> Result<bool> {
        Ok(self.join_event(event_id).await?)
    }

    async fn get_active_banner(
        &self,
        placement: &str,
        country: Option<&str>,
        region: Option<&str>,
    ) -> Result<Option<Banner>> {
        Ok(self.get_active_banner(placement, country, region).await?)
    }
}

// ---------------------------------------------------------------------------
// Arc<A> blanket: one client shared across components
// ---------------------------------------------------------------------------

#[async_trait]
impl<A: EventsApi + ?Sized> EventsApi for Arc<A> {
    async fn list_events(&self) -> Result<Vec<Event>> {
        (**self).list_events().await
    }

    async fn get_event(&self, event_id: &str) -> Result<Event> {
        (**self).get_event(event_id).await
    }

    async fn list_following_events(&self) -> Result<Vec<Event>> {
        (**self).list_following_events().await
    }

    async fn open_or_join_room(&self, event_id: &str) -> Result<RoomGrant> {
        (**self).open_or_join_room(event_id).await
    }

    async fn list_room_messages(&self, room_id: &str) -> Result<Vec<Message>> {
        (**self).list_room_messages(room_id).await
    }

    async fn post_room_message(&self, room_id: &str, text: &str) -> Result<bool> {
        (**self).post_room_message(room_id, text).await
    }

    async fn mark_room_read(&self, room_id: &str) -> Result<bool> {
        (**self).mark_room_read(room_id).await
    }

    async fn join_event(&self, event_id: &str) -> Result<bool> {
        (**self).join_event(event_id).await
    }

    async fn get_active_banner(
        &self,
        placement: &str,
        country: Option<&str>,
        region: Option<&str>,
    ) -> Result<Option<Banner>> {
        (**self).get_active_banner(placement, country, region).await
    }
}
