//! Error handling and edge case tests.

use room_timeline::{
    Client, ClientConfig, Direction, Event, EventId, FixupContext, Page, PageRequest, PageSource,
    Result, Room, RoomId, Timeline, TimelineError, TimelineOptions,
};
use serde_json::json;

fn room() -> Room {
    Room::new(RoomId::new("!r:x"), TimelineOptions::default()).with_user("@me:x")
}

// --- Malformed input ---

#[test]
fn test_non_objects_skipped() {
    let mut timeline = Timeline::default();
    let outcome = timeline.insert_raw(
        vec![
            json!(null),
            json!(42),
            json!("m.room.message"),
            json!([{"type": "m.room.message"}]),
            json!({"type": "m.room.message", "event_id": "$ok", "origin_server_ts": 1}),
        ],
        &FixupContext::default(),
    );

    assert_eq!(outcome.skipped, 4);
    assert_eq!(outcome.added, 1);
    assert_eq!(timeline.len(), 1);
}

#[test]
fn test_wrongly_typed_fields_skipped() {
    let mut timeline = Timeline::default();
    let outcome = timeline.insert_raw(
        vec![
            json!({"type": "m.room.message", "event_id": "$bad", "origin_server_ts": "yesterday"}),
            json!({"type": 7, "event_id": "$bad2"}),
        ],
        &FixupContext::default(),
    );

    assert_eq!(outcome.skipped, 2);
    assert!(timeline.is_empty());
    assert_eq!(outcome.direction, None);
}

#[test]
fn test_events_without_id_skipped() {
    let mut timeline = Timeline::default();
    let outcome = timeline.insert_raw(
        vec![
            json!({"type": "m.room.message", "origin_server_ts": 1, "content": {"body": "a"}}),
            json!({"type": "m.room.message", "event_id": "", "origin_server_ts": 2}),
            json!({"type": "m.room.message", "event_id": "$ok", "origin_server_ts": 3}),
        ],
        &FixupContext::default(),
    );

    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.added, 1);
    assert_eq!(timeline.len(), 1);
}

#[test]
fn test_all_malformed_batch_is_noop() {
    let mut timeline = Timeline::default();
    timeline.insert(vec![Event::new("$a", "m.room.message").with_ts(1)]);
    let before = timeline.modified();

    let outcome = timeline.insert_raw(vec![json!(1), json!(false)], &FixupContext::default());

    assert_eq!(outcome.skipped, 2);
    assert_eq!(timeline.modified(), before);
}

#[test]
fn test_empty_batch_is_noop() {
    let mut timeline = Timeline::default();
    let outcome = timeline.insert(Vec::new());
    assert_eq!(outcome.direction, None);
    assert_eq!(timeline.modified(), outcome.generation);
    assert!(timeline.is_empty());
}

#[test]
fn test_from_value_rejects_non_object() {
    let result = Event::from_value(json!(["not", "an", "event"]));
    assert!(matches!(result, Err(TimelineError::Malformed(_))));
}

// --- Direct writes to derived state ---

#[test]
#[should_panic(expected = "illegal write")]
fn test_state_write_panics() {
    let room = room();
    room.state()
        .set("m.room.member", "@a", Event::new("$x", "m.room.member"));
}

#[test]
#[should_panic(expected = "illegal write")]
fn test_content_write_panics() {
    let room = room();
    room.state()
        .content()
        .set("m.room.topic", "", json!({"topic": "sneaky"}));
}

#[test]
fn test_state_maps_are_snapshots() {
    let mut room = room();
    room.insert(vec![Event::new("$t", "m.room.topic")
        .with_state_key("")
        .with_ts(1)
        .with_content(json!({"topic": "a"}))]);

    let mut copy = (*room.state().get("m.room.topic")).clone();
    copy.clear();

    assert_eq!(room.state().get("m.room.topic").len(), 1);
}

// --- Pending events ---

#[test]
fn test_confirm_unknown_transaction() {
    let mut room = room();
    let result = room.confirm("m0.1", EventId::new("$x"));
    assert!(matches!(result, Err(TimelineError::PendingNotFound(_))));
}

#[test]
fn test_double_confirm() {
    let mut room = room();
    let pending = room.issue("m.room.message", None, json!({"body": "hi"})).unwrap();
    room.confirm(&pending.transaction_id, EventId::new("$1")).unwrap();

    let again = room.confirm(&pending.transaction_id, EventId::new("$1"));
    assert!(matches!(again, Err(TimelineError::PendingNotFound(_))));
    assert_eq!(room.timeline().len(), 1);
}

#[test]
fn test_pending_conflict_released_after_confirm() {
    let mut room = room();
    let first = room.issue("m.room.message", None, json!({})).unwrap();
    assert!(matches!(
        room.issue("m.room.message", None, json!({})),
        Err(TimelineError::PendingConflict(_))
    ));

    room.confirm(&first.transaction_id, EventId::new("$1")).unwrap();
    assert!(room.issue("m.room.message", None, json!({})).is_ok());
}

// --- Client errors ---

#[test]
fn test_unknown_room_operations() {
    let mut client = Client::default();
    let room_id = RoomId::new("!missing:x");

    assert!(matches!(
        client.insert(&room_id, Vec::new()),
        Err(TimelineError::RoomNotFound(_))
    ));
    assert!(matches!(
        client.invalidate(&room_id, "m.room.name"),
        Err(TimelineError::RoomNotFound(_))
    ));
    assert!(matches!(
        client.confirm(&room_id, "txn", EventId::new("$1")),
        Err(TimelineError::RoomNotFound(_))
    ));
    assert!(client.remove_room(&room_id).is_none());
}

#[test]
fn test_invalid_config_json() {
    let result = ClientConfig::from_json(r#"{"timeline": {"limit": "lots"}}"#);
    assert!(matches!(result, Err(TimelineError::Malformed(_))));

    let result = ClientConfig::from_json("not json");
    assert!(result.is_err());
}

struct Offline;

impl PageSource for Offline {
    fn fetch(&self, _room_id: &RoomId, _request: &PageRequest) -> Result<Page> {
        Err(TimelineError::Source("connection refused".into()))
    }
}

#[test]
fn test_failed_fetch_leaves_cursor() {
    let mut client = Client::default();
    let room_id = RoomId::new("!r:x");
    client.apply_sync(
        &serde_json::from_value(json!({
            "rooms": {"join": {"!r:x": {"prev_batch": "p1"}}}
        }))
        .unwrap(),
    );

    let result = client.paginate(&room_id, &Offline, Direction::Backward, 20);
    assert!(matches!(result, Err(TimelineError::Source(_))));

    let room = client.room(&room_id).unwrap();
    assert_eq!(room.cursor(Direction::Backward), Some("p1"));
    assert!(!room.history_exhausted());
}

// --- Comparator edge cases ---

#[test]
fn test_same_timestamp_orders_by_event_id() {
    let mut timeline = Timeline::default();
    timeline.insert(vec![
        Event::new("$b", "m.room.message").with_ts(5),
        Event::new("$a", "m.room.message").with_ts(5),
    ]);
    let ids: Vec<&str> = timeline.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["$a", "$b"]);
}

#[test]
fn test_copies_with_different_timestamps_deduplicate() {
    let mut timeline = Timeline::default();
    timeline.insert(vec![
        Event::new("$a", "m.room.message").with_ts(5),
        Event::new("$m", "m.room.message").with_ts(6),
    ]);
    let outcome = timeline.insert(vec![Event::new("$a", "m.room.message").with_ts(9)]);

    assert_eq!(outcome.added, 0);
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline.get("$a").unwrap().origin_server_ts, Some(5));
}
