//! Protocol events and their ordering.
//!
//! Events are plain values. A timeline sorts them with [`Event::cmp_order`],
//! which is keyed on `origin_server_ts` first and falls back through the
//! identifying fields so that the order is total and deterministic.

use crate::error::{Result, TimelineError};
use crate::types::{EventId, Membership, RoomId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Server-provided metadata that is not part of the signed event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Unsigned {
    /// Milliseconds elapsed since the event was sent, at delivery time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,

    /// Client transaction id, echoed back for the sender's own events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl Unsigned {
    pub fn is_empty(&self) -> bool {
        self.age.is_none() && self.transaction_id.is_none()
    }
}

/// A single room event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub event_id: EventId,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Presence marks a state event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Authoritative ordering key, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_server_ts: Option<i64>,

    #[serde(default)]
    pub content: Value,

    /// Membership inferred locally from the sync action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<Membership>,

    #[serde(default, skip_serializing_if = "Unsigned::is_empty")]
    pub unsigned: Unsigned,
}

/// Context for the one-time fix-up applied when an event enters a timeline.
#[derive(Clone, Copy, Debug)]
pub struct FixupContext<'a> {
    /// Room of the receiving timeline.
    pub room_id: Option<&'a RoomId>,
    /// The local user.
    pub user_id: Option<&'a str>,
    /// Sync action the batch arrived under.
    pub action: Option<Membership>,
    /// Substitute for a missing `origin_server_ts`.
    pub now: Timestamp,
}

impl Default for FixupContext<'_> {
    fn default() -> Self {
        Self {
            room_id: None,
            user_id: None,
            action: None,
            now: Timestamp::now(),
        }
    }
}

impl Event {
    /// Create a bare event with an id and a type.
    pub fn new(event_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            event_id: EventId::new(event_id),
            event_type: event_type.into(),
            state_key: None,
            room_id: None,
            sender: None,
            origin_server_ts: None,
            content: Value::Object(Default::default()),
            membership: None,
            unsigned: Unsigned::default(),
        }
    }

    pub fn with_state_key(mut self, state_key: impl Into<String>) -> Self {
        self.state_key = Some(state_key.into());
        self
    }

    pub fn with_ts(mut self, ts: i64) -> Self {
        self.origin_server_ts = Some(ts);
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(RoomId::new(room_id));
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    /// Parse an event from untyped JSON. Non-objects and events without an
    /// `event_id` are rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(TimelineError::Malformed(format!(
                "expected an object, got {}",
                json_kind(&value)
            )));
        }
        let event: Event = serde_json::from_value(value)?;
        if event.event_id.as_str().is_empty() {
            return Err(TimelineError::Malformed(format!(
                "{} event without event_id",
                event.event_type
            )));
        }
        Ok(event)
    }

    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    pub fn is_type(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }

    /// True if both are state events for the same (type, state_key) pair.
    pub fn same_state_slot(&self, other: &Event) -> bool {
        self.is_state() && self.event_type == other.event_type && self.state_key == other.state_key
    }

    /// Membership from the envelope, or failing that from the content.
    pub fn membership_str(&self) -> Option<&str> {
        match self.membership {
            Some(m) => Some(m.as_str()),
            None => self.content.get("membership").and_then(Value::as_str),
        }
    }

    /// Server part of the sender id.
    pub fn sender_domain(&self) -> Option<&str> {
        self.sender.as_deref().and_then(domain_of)
    }

    /// Apply the insertion-time fix-up.
    pub fn fix(&mut self, ctx: &FixupContext<'_>) {
        if self.room_id.is_none() {
            self.room_id = ctx.room_id.cloned();
        }

        if self.origin_server_ts.is_none() {
            self.origin_server_ts = Some(ctx.now.0);
        }

        if let (Some(action), Some(user_id)) = (ctx.action, ctx.user_id) {
            if self.event_type == "m.room.member"
                && self.state_key.as_deref() == Some(user_id)
                && self.membership_str().is_none()
            {
                self.membership = Some(action);
            }
        }
    }

    /// Total order used to sort a timeline.
    ///
    /// The first decisive comparison wins: timestamp (only when both sides
    /// have one), `unsigned.age` (only when neither has a timestamp, larger age
    /// is older), room, event id, sender, serialized content, and finally the
    /// remaining envelope fields. Events equal under this order are
    /// structurally identical.
    pub fn cmp_order(&self, other: &Event) -> Ordering {
        match (self.origin_server_ts, other.origin_server_ts) {
            (Some(a), Some(b)) if a != b => return a.cmp(&b),
            (None, None) => {
                if let (Some(a), Some(b)) = (self.unsigned.age, other.unsigned.age) {
                    if a != b {
                        return b.cmp(&a);
                    }
                }
            }
            _ => {}
        }

        self.room_id
            .cmp(&other.room_id)
            .then_with(|| self.event_id.cmp(&other.event_id))
            .then_with(|| self.sender.cmp(&other.sender))
            .then_with(|| {
                if self.content == other.content {
                    Ordering::Equal
                } else {
                    self.content.to_string().cmp(&other.content.to_string())
                }
            })
            .then_with(|| self.event_type.cmp(&other.event_type))
            .then_with(|| self.state_key.cmp(&other.state_key))
            .then_with(|| self.membership.cmp(&other.membership))
            .then_with(|| self.unsigned.age.cmp(&other.unsigned.age))
            .then_with(|| self.unsigned.transaction_id.cmp(&other.unsigned.transaction_id))
    }
}

/// Server part of a `sigil local:server` identifier.
pub(crate) fn domain_of(id: &str) -> Option<&str> {
    id.split_once(':').map(|(_, domain)| domain)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_ness_follows_state_key() {
        let message = Event::new("$m", "m.room.message");
        let topic = Event::new("$t", "m.room.topic").with_state_key("");
        assert!(!message.is_state());
        assert!(topic.is_state());
    }

    #[test]
    fn test_parse_from_wire_json() {
        let event = Event::from_value(json!({
            "event_id": "$1:a",
            "type": "m.room.create",
            "state_key": "",
            "sender": "@a:a",
            "origin_server_ts": 100,
            "content": {"creator": "@a:a"},
        }))
        .unwrap();

        assert_eq!(event.event_id, EventId::new("$1:a"));
        assert_eq!(event.state_key.as_deref(), Some(""));
        assert_eq!(event.origin_server_ts, Some(100));
        assert_eq!(event.sender_domain(), Some("a"));
    }

    #[test]
    fn test_reject_non_object() {
        let result = Event::from_value(json!("m.room.message"));
        assert!(matches!(result, Err(TimelineError::Malformed(_))));
    }

    #[test]
    fn test_reject_missing_event_id() {
        let result = Event::from_value(json!({"type": "m.room.message", "content": {}}));
        assert!(matches!(result, Err(TimelineError::Malformed(_))));
    }

    #[test]
    fn test_order_by_timestamp_then_id() {
        let a = Event::new("$b", "m.room.message").with_ts(10);
        let b = Event::new("$a", "m.room.message").with_ts(20);
        let c = Event::new("$a", "m.room.message").with_ts(10);
        assert_eq!(a.cmp_order(&b), Ordering::Less);
        assert_eq!(c.cmp_order(&a), Ordering::Less);
    }

    #[test]
    fn test_age_orders_untimed_events() {
        let older = Event {
            unsigned: Unsigned {
                age: Some(5000),
                transaction_id: None,
            },
            ..Event::new("$z", "m.room.message")
        };
        let newer = Event {
            unsigned: Unsigned {
                age: Some(10),
                transaction_id: None,
            },
            ..Event::new("$a", "m.room.message")
        };
        assert_eq!(older.cmp_order(&newer), Ordering::Less);
    }

    #[test]
    fn test_identical_events_compare_equal() {
        let a = Event::new("$a", "m.room.message")
            .with_ts(1)
            .with_content(json!({"body": "hi"}));
        assert_eq!(a.cmp_order(&a.clone()), Ordering::Equal);

        let b = a.clone().with_content(json!({"body": "ho"}));
        assert_ne!(a.cmp_order(&b), Ordering::Equal);
        assert_eq!(a.cmp_order(&b), b.cmp_order(&a).reverse());
    }

    #[test]
    fn test_fix_fills_missing_fields() {
        let room = RoomId::new("!r:a");
        let ctx = FixupContext {
            room_id: Some(&room),
            user_id: Some("@me:a"),
            action: Some(Membership::Invite),
            now: Timestamp(42),
        };

        let mut own = Event::new("$m", "m.room.member").with_state_key("@me:a");
        own.fix(&ctx);
        assert_eq!(own.origin_server_ts, Some(42));
        assert_eq!(own.room_id.as_ref(), Some(&room));
        assert_eq!(own.membership, Some(Membership::Invite));

        let mut other = Event::new("$o", "m.room.member").with_state_key("@you:a");
        other.fix(&ctx);
        assert_eq!(other.membership, None);

        let mut explicit = Event::new("$e", "m.room.member")
            .with_state_key("@me:a")
            .with_ts(7)
            .with_content(json!({"membership": "join"}));
        explicit.fix(&ctx);
        assert_eq!(explicit.origin_server_ts, Some(7));
        assert_eq!(explicit.membership, None);
        assert_eq!(explicit.membership_str(), Some("join"));
    }
}
