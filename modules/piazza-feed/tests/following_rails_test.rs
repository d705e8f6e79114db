//! Following page: organizer rails, sponsored slots, and join.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use piazza_common::{Banner, BannerScope};
use piazza_feed::following::CardAction;
use piazza_feed::headless::HeadlessRails;
use piazza_feed::testing::{event, MockApi};
use piazza_feed::{FollowingFeed, NoticeKind, RailSlot, ViewerContext};

fn followed() -> Vec<piazza_common::Event> {
    vec![
        event(json!({
            "id": "b1", "title": "Beta night", "status": "future",
            "organizer": { "id": "o2", "name": "Beta Org" }
        })),
        event(json!({
            "id": "a1", "title": "Alpha market", "status": "imminent",
            "organizer": { "id": "o1", "name": "Alpha Org" }
        })),
        event(json!({
            "id": "a2", "title": "Alpha talk", "status": "ongoing",
            "organizer_id": "o1", "organizer_name": "ALPHA ORG"
        })),
    ]
}

fn banner() -> Banner {
    Banner {
        id: Some("bn1".into()),
        title: Some("Support local makers".into()),
        body: None,
        image_url: None,
        link_url: Some("https://example.org/makers".into()),
    }
}

fn feed(api: &Arc<MockApi>) -> (FollowingFeed<MockApi, HeadlessRails>, HeadlessRails) {
    let sink = HeadlessRails::default();
    let scope = BannerScope {
        placement: "following".into(),
        country: Some("IT".into()),
        region: None,
    };
    let feed = FollowingFeed::new(
        api.clone(),
        sink.clone(),
        ViewerContext::for_user("u1"),
        scope,
        Duration::from_secs(4),
    );
    (feed, sink)
}

#[tokio::test]
async fn rails_group_by_id_and_sort_by_name() {
    let api = Arc::new(MockApi::new().with_following(followed()));
    let (feed, sink) = feed(&api);

    assert_eq!(feed.load().await, 2);

    let rails = sink.snapshot().rails;
    let names: Vec<&str> = rails.iter().map(|r| r.organizer_name.as_str()).collect();
    assert_eq!(names, vec!["Alpha Org", "Beta Org"]);
    assert_eq!(rails[0].event_ids(), vec!["a2", "a1"]);
}

#[tokio::test]
async fn every_rail_gets_its_banner() {
    let api = Arc::new(MockApi::new().with_following(followed()).with_banner(banner()));
    let (feed, sink) = feed(&api);

    feed.load().await;

    assert_eq!(api.count("get_active_banner:following"), 2);
    for rail in sink.snapshot().rails {
        let filled = rail.slots.iter().any(|slot| {
            matches!(slot, RailSlot::Sponsored { banner: Some(b) } if b.id.as_deref() == Some("bn1"))
        });
        assert!(filled, "rail {} has no banner", rail.organizer_id);
    }
}

#[tokio::test]
async fn banner_failure_keeps_placeholder_and_cards() {
    let api = Arc::new(
        MockApi::new()
            .with_following(followed())
            .failing("get_active_banner"),
    );
    let (feed, sink) = feed(&api);

    assert_eq!(feed.load().await, 2);

    let rails = sink.snapshot().rails;
    assert_eq!(rails[0].slots.len(), 3);
    assert!(matches!(rails[0].slots[1], RailSlot::Sponsored { banner: None }));
    assert!(sink.snapshot().notices.is_empty());
}

#[tokio::test]
async fn join_flips_card_to_participating() {
    let api = Arc::new(MockApi::new().with_following(followed()).with_banner(banner()));
    let (feed, sink) = feed(&api);
    feed.load().await;

    assert!(feed.join("b1").await);

    let rails = sink.snapshot().rails;
    let beta = rails.iter().find(|r| r.organizer_id == "o2").unwrap();
    let card = beta.cards().next().unwrap();
    assert_eq!(card.action, CardAction::Participating);
    assert!(matches!(beta.slots[1], RailSlot::Sponsored { banner: Some(_) }));
    assert_eq!(sink.snapshot().render_count, 2);
}

#[tokio::test]
async fn failed_join_leaves_rails_untouched() {
    let api = Arc::new(MockApi::new().with_following(followed()).failing("join_event"));
    let (feed, sink) = feed(&api);
    feed.load().await;

    assert!(!feed.join("b1").await);

    let snapshot = sink.snapshot();
    assert_eq!(snapshot.render_count, 1);
    assert_eq!(snapshot.notices.last().unwrap().kind, NoticeKind::Error);
}

#[tokio::test]
async fn load_failure_surfaces_notice() {
    let api = Arc::new(MockApi::new().failing("list_following_events"));
    let (feed, sink) = feed(&api);

    assert_eq!(feed.load().await, 0);

    let snapshot = sink.snapshot();
    assert!(snapshot.rails.is_empty());
    assert_eq!(snapshot.notices.len(), 1);
}
