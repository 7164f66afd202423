//! Cached current-state view over a timeline.

use super::defaults::{defaults_for, SEEDED_TYPES};
use super::StateMap;
use crate::timeline::{Timeline, TimelineId};
use crate::types::Generation;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug)]
struct CacheEntry {
    /// Timeline and generation this entry was derived at; `None` forces a
    /// recompute.
    validated: Option<(TimelineId, Generation)>,
    events: Arc<StateMap>,
}

impl CacheEntry {
    fn seeded(event_type: &str) -> Self {
        Self {
            validated: None,
            events: Arc::new(defaults_for(event_type)),
        }
    }
}

/// Memoized `(type -> state_key -> event)` projection of one timeline.
///
/// Entries are a pure cache. An entry is served only to the timeline it was
/// derived from and only while its generation is current, otherwise it is
/// rebuilt from the timeline.
#[derive(Debug)]
pub struct StateProjection {
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheEntry {
    fn is_current(&self, timeline: &Timeline) -> bool {
        self.validated
            .is_some_and(|(id, gen)| id == timeline.id() && gen >= timeline.modified())
    }
}

impl StateProjection {
    /// Create a projection seeded with protocol defaults.
    pub fn new() -> Self {
        let cache = SEEDED_TYPES
            .iter()
            .map(|t| (t.to_string(), CacheEntry::seeded(t)))
            .collect();
        Self {
            cache: RwLock::new(cache),
        }
    }

    /// Bind this projection to the timeline it caches.
    pub fn view<'a>(&'a self, timeline: &'a Timeline) -> State<'a> {
        State {
            timeline,
            projection: self,
        }
    }

    /// Whether the cached entry for `event_type` is current for `timeline`.
    pub fn is_valid(&self, timeline: &Timeline, event_type: &str) -> bool {
        self.cache
            .read()
            .get(event_type)
            .is_some_and(|entry| entry.is_current(timeline))
    }

    /// Current state of `event_type`, recomputed if stale.
    pub fn get(&self, timeline: &Timeline, event_type: &str) -> Arc<StateMap> {
        let modified = timeline.modified();
        if let Some(entry) = self.cache.read().get(event_type) {
            if entry.is_current(timeline) {
                return Arc::clone(&entry.events);
            }
        }

        let events = Arc::new(derive(timeline, event_type));
        trace!(event_type, keys = events.len(), ?modified, "recomputed state");

        self.cache.write().insert(
            event_type.to_string(),
            CacheEntry {
                validated: Some((timeline.id(), modified)),
                events: Arc::clone(&events),
            },
        );
        events
    }

    /// Reset one type to its defaults and force the next read to rederive it.
    pub fn invalidate(&self, event_type: &str) {
        self.cache
            .write()
            .insert(event_type.to_string(), CacheEntry::seeded(event_type));
    }
}

impl Default for StateProjection {
    fn default() -> Self {
        Self::new()
    }
}

/// Rederive the state of `event_type` from scratch.
///
/// Starts from the protocol defaults and replays the type's state events in
/// chronological order so later events overwrite earlier ones per key.
pub fn derive(timeline: &Timeline, event_type: &str) -> StateMap {
    let mut map = defaults_for(event_type);
    let mut hits = timeline.query(|e, _| e.is_state() && e.is_type(event_type), usize::MAX);
    hits.reverse();
    for i in hits {
        let event = &timeline[i];
        if let Some(key) = &event.state_key {
            map.insert(key.clone(), event.clone());
        }
    }
    map
}

/// A projection bound to its timeline.
#[derive(Clone, Copy, Debug)]
pub struct State<'a> {
    timeline: &'a Timeline,
    projection: &'a StateProjection,
}

impl<'a> State<'a> {
    pub fn timeline(&self) -> &'a Timeline {
        self.timeline
    }

    pub fn get(&self, event_type: &str) -> Arc<StateMap> {
        self.projection.get(self.timeline, event_type)
    }

    /// Current event for one `(type, state_key)` slot.
    pub fn get_key(&self, event_type: &str, state_key: &str) -> Option<crate::event::Event> {
        self.get(event_type).get(state_key).cloned()
    }

    pub fn invalidate(&self, event_type: &str) {
        self.projection.invalidate(event_type)
    }

    /// Content payloads instead of full events.
    pub fn content(&self) -> ContentView<'a> {
        ContentView { state: *self }
    }

    /// State is derived from the timeline and cannot be written.
    ///
    /// # Panics
    ///
    /// Always. Insert events into the timeline instead.
    pub fn set(&self, event_type: &str, state_key: &str, _event: crate::event::Event) -> ! {
        panic!(
            "illegal write to derived room state ({event_type}, {state_key:?}); \
             insert the event into the timeline instead"
        )
    }
}

/// Content-only view, derived on demand from [`State::get`].
#[derive(Clone, Copy, Debug)]
pub struct ContentView<'a> {
    state: State<'a>,
}

impl ContentView<'_> {
    pub fn get(&self, event_type: &str) -> BTreeMap<String, Value> {
        self.state
            .get(event_type)
            .iter()
            .map(|(key, event)| (key.clone(), event.content.clone()))
            .collect()
    }

    /// # Panics
    ///
    /// Always; see [`State::set`].
    pub fn set(&self, event_type: &str, state_key: &str, _content: Value) -> ! {
        panic!(
            "illegal write to derived room state content ({event_type}, {state_key:?}); \
             insert the event into the timeline instead"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use serde_json::json;

    fn member(id: &str, user: &str, ts: i64, membership: &str) -> Event {
        Event::new(id, "m.room.member")
            .with_state_key(user)
            .with_ts(ts)
            .with_content(json!({"membership": membership}))
    }

    #[test]
    fn test_defaults_before_any_event() {
        let timeline = Timeline::default();
        let projection = StateProjection::new();
        let state = projection.view(&timeline);

        let power = state.content().get("m.room.power_levels");
        assert_eq!(power[""]["kick"], 50);
        assert!(state.get("m.room.member").is_empty());
    }

    #[test]
    fn test_create_event_projected() {
        let mut timeline = Timeline::default();
        let create = Event::new("$1", "m.room.create")
            .with_state_key("")
            .with_ts(100)
            .with_content(json!({"creator": "@a"}));
        timeline.insert(vec![create]);

        let projection = StateProjection::new();
        let created = projection.view(&timeline).get("m.room.create");
        assert_eq!(created.len(), 1);
        assert_eq!(created[""].event_id.as_str(), "$1");
        assert_eq!(created[""].content["creator"], "@a");
    }

    #[test]
    fn test_newer_state_wins() {
        let mut timeline = Timeline::default();
        timeline.insert(vec![member("$20", "@a", 20, "leave"), member("$10", "@a", 10, "join")]);

        let projection = StateProjection::new();
        let members = projection.view(&timeline).get("m.room.member");
        assert_eq!(members["@a"].event_id.as_str(), "$20");
    }

    #[test]
    fn test_cache_served_until_timeline_changes() {
        let mut timeline = Timeline::default();
        timeline.insert(vec![member("$1", "@a", 1, "join")]);

        let projection = StateProjection::new();
        let first = projection.get(&timeline, "m.room.member");
        assert!(projection.is_valid(&timeline, "m.room.member"));
        let second = projection.get(&timeline, "m.room.member");
        assert!(Arc::ptr_eq(&first, &second));

        timeline.insert(vec![member("$2", "@b", 2, "join")]);
        assert!(!projection.is_valid(&timeline, "m.room.member"));
        let third = projection.get(&timeline, "m.room.member");
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn test_cache_not_shared_across_timelines() {
        let topic = |id: &str| {
            Event::new(id, "m.room.topic")
                .with_state_key("")
                .with_ts(1)
                .with_content(json!({"topic": id}))
        };
        let mut a = Timeline::default();
        a.insert(vec![topic("$ta")]);
        let mut b = Timeline::default();
        b.insert(vec![topic("$tb")]);
        assert_eq!(a.modified(), b.modified());

        let projection = StateProjection::new();
        assert_eq!(projection.get(&a, "m.room.topic")[""].event_id.as_str(), "$ta");
        assert!(!projection.is_valid(&b, "m.room.topic"));
        assert_eq!(projection.get(&b, "m.room.topic")[""].event_id.as_str(), "$tb");
        assert!(!projection.is_valid(&a, "m.room.topic"));
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let mut timeline = Timeline::default();
        timeline.insert(vec![member("$1", "@a", 1, "join")]);

        let projection = StateProjection::new();
        projection.get(&timeline, "m.room.member");
        projection.invalidate("m.room.member");
        assert!(!projection.is_valid(&timeline, "m.room.member"));
        assert_eq!(projection.get(&timeline, "m.room.member").len(), 1);
    }

    #[test]
    fn test_non_state_events_ignored() {
        let mut timeline = Timeline::default();
        timeline.insert(vec![Event::new("$m", "m.room.member").with_ts(1)]);
        let projection = StateProjection::new();
        assert!(projection.get(&timeline, "m.room.member").is_empty());
    }

    #[test]
    #[should_panic(expected = "illegal write")]
    fn test_direct_write_panics() {
        let timeline = Timeline::default();
        let projection = StateProjection::new();
        projection
            .view(&timeline)
            .set("m.room.member", "@a", member("$x", "@a", 1, "join"));
    }

    #[test]
    #[should_panic(expected = "illegal write")]
    fn test_direct_content_write_panics() {
        let timeline = Timeline::default();
        let projection = StateProjection::new();
        projection
            .view(&timeline)
            .content()
            .set("m.room.topic", "", json!({"topic": "x"}));
    }
}
