//! Room directory summaries.
//!
//! Digests public room state into the shape used by room directories, and
//! turns such a summary back into placeholder state events. Placeholders have
//! `origin_server_ts` 0 so any real event for the same slot supersedes them.

use super::State;
use crate::event::{domain_of, Event};
use crate::types::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Public summary of a room.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSummary {
    pub room_id: Option<RoomId>,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub canonical_alias: Option<String>,
    pub world_readable: bool,
    pub guest_can_join: bool,
    pub num_joined_members: usize,
    pub aliases: Vec<String>,
}

fn content_str(state: &State<'_>, event_type: &str, field: &str) -> Option<String> {
    state
        .get_key(event_type, "")
        .and_then(|e| e.content.get(field).and_then(Value::as_str).map(str::to_string))
}

/// Digest a room's current state.
pub fn summarize(state: &State<'_>) -> RoomSummary {
    let members = state.get("m.room.member");
    let num_joined_members = members
        .values()
        .filter(|e| e.membership_str() == Some("join"))
        .count();

    let aliases = state
        .get("m.room.aliases")
        .values()
        .filter_map(|e| e.content.get("aliases").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    let room_id = state
        .get_key("m.room.create", "")
        .and_then(|e| e.room_id)
        .or_else(|| state.timeline().room_id().cloned());

    RoomSummary {
        room_id,
        name: content_str(state, "m.room.name", "name"),
        topic: content_str(state, "m.room.topic", "topic"),
        canonical_alias: content_str(state, "m.room.canonical_alias", "alias"),
        world_readable: content_str(state, "m.room.history_visibility", "history_visibility")
            .as_deref()
            == Some("world_readable"),
        guest_can_join: content_str(state, "m.room.guest_access", "guest_access").as_deref()
            == Some("can_join"),
        num_joined_members,
        aliases,
    }
}

impl RoomSummary {
    /// Placeholder state events carrying this summary.
    pub fn to_events(&self) -> Vec<Event> {
        let mut events = Vec::new();

        if let Some(name) = &self.name {
            events.push(placeholder("m.room.name", "", json!({"name": name})));
        }
        if let Some(topic) = &self.topic {
            events.push(placeholder("m.room.topic", "", json!({"topic": topic})));
        }
        if let Some(alias) = &self.canonical_alias {
            events.push(placeholder(
                "m.room.canonical_alias",
                "",
                json!({"alias": alias}),
            ));
        }

        let mut by_domain: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for alias in &self.aliases {
            if let Some(domain) = domain_of(alias) {
                by_domain.entry(domain).or_default().push(alias);
            }
        }
        for (domain, aliases) in by_domain {
            events.push(placeholder(
                "m.room.aliases",
                domain,
                json!({"aliases": aliases}),
            ));
        }

        let guest_access = if self.guest_can_join { "can_join" } else { "forbidden" };
        events.push(placeholder(
            "m.room.guest_access",
            "",
            json!({"guest_access": guest_access}),
        ));

        if self.world_readable {
            events.push(placeholder(
                "m.room.history_visibility",
                "",
                json!({"history_visibility": "world_readable"}),
            ));
        }

        if let Some(room_id) = &self.room_id {
            for event in &mut events {
                event.room_id = Some(room_id.clone());
            }
        }
        events
    }
}

fn placeholder(event_type: &str, state_key: &str, content: Value) -> Event {
    Event::new(format!("$summary/{event_type}/{state_key}"), event_type)
        .with_state_key(state_key)
        .with_ts(0)
        .with_content(content)
}
