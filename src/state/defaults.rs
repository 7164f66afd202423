//! Protocol defaults for well-known state types.
//!
//! Lookups of these types are well defined before any real event has
//! arrived. Keyed types (aliases, members) default to an empty map; the rest
//! default to one placeholder under the empty state key.

use super::StateMap;
use crate::event::Event;
use serde_json::{json, Value};

/// Types that are seeded into every projection.
pub const SEEDED_TYPES: &[&str] = &[
    "m.room.aliases",
    "m.room.canonical_alias",
    "m.room.create",
    "m.room.join_rules",
    "m.room.member",
    "m.room.power_levels",
    "m.room.name",
    "m.room.topic",
    "m.room.avatar",
    "m.room.history_visibility",
    "m.room.guest_access",
];

fn default_content(event_type: &str) -> Option<Value> {
    let content = match event_type {
        "m.room.canonical_alias" => json!({"alias": null}),
        "m.room.create" => json!({"creator": null}),
        "m.room.join_rules" => json!({"join_rule": null}),
        "m.room.power_levels" => json!({
            "events_default": 0,
            "state_default": 0,
            "users_default": 0,
            "ban": 50,
            "invite": 50,
            "kick": 50,
            "redact": 50,
            "events": {},
            "users": {},
        }),
        "m.room.name" => json!({"name": null}),
        "m.room.topic" => json!({"topic": null}),
        "m.room.avatar" => json!({"info": {}, "url": null}),
        "m.room.history_visibility" => json!({"history_visibility": "shared"}),
        "m.room.guest_access" => json!({"guest_access": "forbidden"}),
        _ => return None,
    };
    Some(content)
}

/// Default state for a type. Unknown and keyed types are empty.
pub fn defaults_for(event_type: &str) -> StateMap {
    let mut map = StateMap::new();
    if let Some(content) = default_content(event_type) {
        let placeholder = Event::new("", event_type)
            .with_state_key("")
            .with_content(content);
        map.insert(String::new(), placeholder);
    }
    map
}
