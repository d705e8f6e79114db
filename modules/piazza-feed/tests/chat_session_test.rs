//! Chat session lifecycle: reselection races, poll cadence, sends and teardown.
//!
//! Runs on tokio's paused clock; the mock API answers instantly unless a call
//! is held with a gate.

use std::sync::Arc;
use std::time::Duration;

use piazza_common::ChatConfig;
use piazza_feed::headless::HeadlessChat;
use piazza_feed::testing::MockApi;
use piazza_feed::{ChatPhase, ChatPollingSession, OpenOutcome, SendOutcome};

type Session = ChatPollingSession<MockApi, HeadlessChat>;

fn session(api: &Arc<MockApi>) -> (Arc<Session>, HeadlessChat) {
    let panel = HeadlessChat::default();
    let session = ChatPollingSession::new(api.clone(), panel.clone(), ChatConfig::default());
    (Arc::new(session), panel)
}

// ---------------------------------------------------------------------------
// Reselection
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn late_open_for_a_never_overrides_b() {
    let api = Arc::new(MockApi::new().with_message("room-B", "hello from B"));
    let release_a = api.hold("open_or_join_room:A");
    let (chat, panel) = session(&api);

    let first = {
        let chat = chat.clone();
        tokio::spawn(async move { chat.open_for_event("A", Some("Event A")).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(api.count("open_or_join_room:A"), 1);

    assert_eq!(chat.open_for_event("B", Some("Event B")).await, OpenOutcome::Active);
    release_a.send(()).unwrap();
    assert_eq!(first.await.unwrap(), OpenOutcome::Superseded);

    tokio::time::sleep(Duration::from_secs(35)).await;

    assert_eq!(api.count("list_room_messages:room-A"), 0);
    assert_eq!(api.count("list_room_messages:room-B"), 4);
    assert!(matches!(chat.phase(), ChatPhase::Active { ref event_id, .. } if event_id == "B"));
    let state = panel.snapshot();
    assert_eq!(state.title.as_deref(), Some("Event B"));
    assert_eq!(state.lines[0].text, "hello from B");
}

#[tokio::test(start_paused = true)]
async fn reopening_cancels_previous_poller() {
    let api = Arc::new(MockApi::new());
    let (chat, _panel) = session(&api);

    chat.open_for_event("A", None).await;
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(api.count("list_room_messages:room-A"), 2);

    chat.open_for_event("B", None).await;
    tokio::time::sleep(Duration::from_secs(55)).await;

    assert_eq!(api.count("list_room_messages:room-A"), 2);
    assert_eq!(api.count("list_room_messages:room-B"), 6);
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn polls_every_ten_seconds_and_marks_read() {
    let api = Arc::new(MockApi::new());
    let (chat, _panel) = session(&api);

    chat.open_for_event("e1", None).await;
    assert_eq!(api.count("list_room_messages"), 1);

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(api.count("list_room_messages"), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(api.count("list_room_messages"), 2);
    assert_eq!(api.count("mark_room_read:room-e1"), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_keeps_polling() {
    let api = Arc::new(MockApi::new());
    let (chat, panel) = session(&api);
    chat.open_for_event("e1", None).await;

    api.fail("list_room_messages");
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert!(chat.is_polling());
    assert!(panel.snapshot().notice.is_some());
    assert_eq!(api.count("mark_room_read"), 1);
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn whitespace_send_is_a_no_op() {
    let api = Arc::new(MockApi::new());
    let (chat, panel) = session(&api);
    chat.open_for_event("e1", None).await;
    let calls_before = api.calls();
    let panel_before = panel.snapshot();

    assert_eq!(chat.send("   ").await, SendOutcome::Skipped);
    assert_eq!(chat.send("").await, SendOutcome::Skipped);

    assert_eq!(api.calls(), calls_before);
    let panel_after = panel.snapshot();
    assert_eq!(panel_after.render_count, panel_before.render_count);
    assert_eq!(panel_after.input_cleared, 0);
}

#[tokio::test(start_paused = true)]
async fn sent_message_appears_without_waiting_for_a_tick() {
    let api = Arc::new(MockApi::new().with_message("room-e1", "welcome"));
    let (chat, panel) = session(&api);
    chat.open_for_event("e1", None).await;

    assert_eq!(chat.send("grazie!").await, SendOutcome::Sent);

    let texts: Vec<String> = panel.snapshot().lines.into_iter().map(|l| l.text).collect();
    assert_eq!(texts, vec!["welcome", "grazie!"]);
    assert_eq!(panel.snapshot().input_cleared, 1);
}

#[tokio::test(start_paused = true)]
async fn send_outside_active_room_is_skipped() {
    let api = Arc::new(MockApi::new());
    let (chat, _panel) = session(&api);

    assert_eq!(chat.send("hello").await, SendOutcome::Skipped);
    assert_eq!(api.count("post_room_message"), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_send_keeps_input() {
    let api = Arc::new(MockApi::new().failing("post_room_message"));
    let (chat, panel) = session(&api);
    chat.open_for_event("e1", None).await;

    assert_eq!(chat.send("hello").await, SendOutcome::Failed);
    assert_eq!(panel.snapshot().input_cleared, 0);
    assert!(panel.snapshot().notice.is_some());
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stop_halts_polling_and_can_repeat() {
    let api = Arc::new(MockApi::new());
    let (chat, _panel) = session(&api);
    chat.open_for_event("e1", None).await;

    chat.stop();
    chat.stop();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(api.count("list_room_messages"), 1);
    assert_eq!(chat.phase(), ChatPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn stop_during_open_discards_the_grant() {
    let api = Arc::new(MockApi::new());
    let release = api.hold("open_or_join_room:e1");
    let (chat, _panel) = session(&api);

    let open = {
        let chat = chat.clone();
        tokio::spawn(async move { chat.open_for_event("e1", None).await })
    };
    tokio::task::yield_now().await;
    chat.stop();
    release.send(()).unwrap();

    assert_eq!(open.await.unwrap(), OpenOutcome::Superseded);
    assert!(!chat.is_polling());
    assert_eq!(chat.phase(), ChatPhase::Idle);
}
