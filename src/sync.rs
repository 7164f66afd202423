//! Inbound batch shapes and the pagination seam.
//!
//! Events stay untyped JSON here. Only a timeline decides what is a usable
//! event, so one malformed element never rejects a whole batch.

use crate::error::Result;
use crate::types::{Direction, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One room's slice of a sync response.
///
/// Only `state` and `timeline` feed the room timeline. `ephemeral` and
/// `account_data` belong to other collaborators and are left untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSync {
    pub state: Vec<Value>,
    pub timeline: Vec<Value>,
    pub ephemeral: Vec<Value>,
    pub account_data: Vec<Value>,
    /// Token for paginating backward from the start of `timeline`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_batch: Option<String>,
}

impl RoomSync {
    /// State then timeline events, as inserted into the room.
    pub fn timeline_events(&self) -> impl Iterator<Item = &Value> {
        self.state.iter().chain(self.timeline.iter())
    }
}

/// Rooms of a sync response, grouped by the local user's membership.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncRooms {
    pub join: BTreeMap<RoomId, RoomSync>,
    pub leave: BTreeMap<RoomId, RoomSync>,
    pub invite: BTreeMap<RoomId, RoomSync>,
}

/// A full incremental sync response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_batch: Option<String>,
    pub rooms: SyncRooms,
}

/// Parameters of one pagination fetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub dir: Direction,
    pub limit: usize,
}

/// One page of events returned by a pagination fetch.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    pub chunk: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Something that can fetch a page of room history.
pub trait PageSource {
    fn fetch(&self, room_id: &RoomId, request: &PageRequest) -> Result<Page>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sync_response() {
        let response: SyncResponse = serde_json::from_value(json!({
            "next_batch": "s72",
            "rooms": {
                "join": {
                    "!a:x": {
                        "state": [{"type": "m.room.create", "state_key": "", "event_id": "$c"}],
                        "timeline": [{"type": "m.room.message", "event_id": "$m"}],
                        "ephemeral": [{"type": "m.typing"}],
                        "prev_batch": "p1"
                    }
                },
                "invite": {"!b:x": {}}
            }
        }))
        .unwrap();

        let joined = &response.rooms.join[&RoomId::new("!a:x")];
        assert_eq!(joined.timeline_events().count(), 2);
        assert_eq!(joined.ephemeral.len(), 1);
        assert_eq!(joined.prev_batch.as_deref(), Some("p1"));
        assert!(response.rooms.invite.contains_key(&RoomId::new("!b:x")));
        assert!(response.rooms.leave.is_empty());
    }

    #[test]
    fn test_parse_page() {
        let page: Page = serde_json::from_value(json!({
            "chunk": [{"type": "m.room.message", "event_id": "$1"}],
            "start": "t1",
            "end": "t0"
        }))
        .unwrap();
        assert_eq!(page.chunk.len(), 1);
        assert_eq!(page.end.as_deref(), Some("t0"));
    }
}
