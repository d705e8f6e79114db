//! Home feed loading: stale responses, ordering, and the map fed from the same load.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use piazza_common::MapConfig;
use piazza_feed::cards::UNCONFIRMED_STATUS_LABEL;
use piazza_feed::headless::{HeadlessFeed, HeadlessMap};
use piazza_feed::testing::{event, MockApi};
use piazza_feed::{FeedLoader, GeoMapProjector, LoadOutcome, ViewerContext};

fn loader(api: &Arc<MockApi>) -> (Arc<FeedLoader<MockApi, HeadlessFeed>>, HeadlessFeed) {
    let sink = HeadlessFeed::default();
    let loader = FeedLoader::new(
        api.clone(),
        sink.clone(),
        ViewerContext::for_user("u1"),
        Duration::from_secs(4),
    );
    (Arc::new(loader), sink)
}

fn card_ids(sink: &HeadlessFeed) -> Vec<String> {
    sink.snapshot()
        .feed
        .map(|feed| feed.cards.into_iter().map(|c| c.event_id).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn slow_first_load_never_overwrites_second() {
    let api = Arc::new(MockApi::new().with_list_responses(vec![
        vec![event(json!({ "id": "stale", "title": "Stale", "status": "future" }))],
        vec![event(json!({ "id": "fresh", "title": "Fresh", "status": "future" }))],
    ]));
    let release_first = api.hold("list_events:1");
    let (loader, sink) = loader(&api);

    let first = {
        let loader = loader.clone();
        tokio::spawn(async move { loader.load_events().await })
    };
    tokio::task::yield_now().await;

    assert_eq!(loader.load_events().await, LoadOutcome::Applied { count: 1 });
    release_first.send(()).unwrap();
    assert_eq!(first.await.unwrap(), LoadOutcome::Superseded);

    assert_eq!(card_ids(&sink), vec!["fresh"]);
    assert_eq!(sink.snapshot().render_count, 1);
    assert_eq!(loader.events()[0].id, "fresh");
}

#[tokio::test]
async fn cards_follow_status_priority_then_start() {
    let api = Arc::new(MockApi::new().with_events(vec![
        event(json!({ "id": "done", "title": "Done", "status": "concluded" })),
        event(json!({ "id": "f-late", "title": "F", "status": "future", "start_at": "2026-09-02T10:00:00Z" })),
        event(json!({ "id": "f-none", "title": "F", "status": "future" })),
        event(json!({ "id": "f-early", "title": "F", "status": "future", "start_at": "2026-09-01T10:00:00Z" })),
        event(json!({ "id": "weird", "title": "W", "status": "postponed" })),
        event(json!({ "id": "live", "title": "L", "status": "LIVE" })),
        event(json!({ "id": "soon", "title": "S", "status": "imminent" })),
    ]));
    let (loader, sink) = loader(&api);

    loader.load_events().await;

    assert_eq!(
        card_ids(&sink),
        vec!["live", "soon", "f-early", "f-late", "f-none", "done", "weird"]
    );
    let feed = sink.snapshot().feed.unwrap();
    let last = feed.cards.last().unwrap();
    assert_eq!(last.status, None);
    assert_eq!(last.status_label, UNCONFIRMED_STATUS_LABEL);
}

#[tokio::test]
async fn my_events_rail_lists_joined_events() {
    let api = Arc::new(MockApi::new().with_events(vec![
        event(json!({ "id": "past-mine", "title": "P", "status": "past", "participants": ["u1"] })),
        event(json!({ "id": "mine", "title": "M", "status": "future", "joined": true })),
        event(json!({ "id": "theirs", "title": "T", "status": "future", "participants": [{ "id": "u2" }] })),
    ]));
    let (loader, sink) = loader(&api);

    loader.load_events().await;

    let feed = sink.snapshot().feed.unwrap();
    let mine: Vec<&str> = feed.my_events.iter().map(|c| c.event_id.as_str()).collect();
    assert_eq!(mine, vec!["mine", "past-mine"]);
}

#[tokio::test]
async fn attached_map_is_rebuilt_on_each_applied_load() {
    let api = Arc::new(MockApi::new().with_list_responses(vec![
        vec![
            event(json!({ "id": "a", "title": "A", "status": "future", "lat": "41,9", "lon": "12,5" })),
            event(json!({ "id": "b", "title": "B", "status": "past", "lat": 45.0, "lon": 9.0 })),
        ],
        vec![event(json!({
            "id": "c", "title": "C", "status": "ongoing",
            "geo": { "coordinates": [9.19, 45.46] }
        }))],
    ]));
    let surface = HeadlessMap::default();
    let map = Arc::new(Mutex::new(GeoMapProjector::new(surface.clone(), MapConfig::default())));
    let sink = HeadlessFeed::default();
    let loader = FeedLoader::new(api.clone(), sink.clone(), ViewerContext::anonymous(), Duration::from_secs(4))
        .with_map(map);

    loader.load_events().await;
    let markers: Vec<String> = surface.snapshot().markers.into_keys().collect();
    assert_eq!(markers, vec!["a"]);

    loader.load_events().await;
    let markers: Vec<String> = surface.snapshot().markers.into_keys().collect();
    assert_eq!(markers, vec!["c"]);
    assert_eq!(surface.snapshot().create_count, 1);
}
