//! Per-room ordered event log.
//!
//! All known events for a room are kept sorted by [`Event::cmp_order`] with
//! duplicates removed. Trimming lets state events accumulate at the front of
//! the sequence. The index where that accumulation ends is the *horizon*:
//! before it every event is a state event, from it onward state and non-state
//! events are mixed.
//!
//! Callers never say which way they are scrolling. [`Timeline::insert`]
//! deduces it from whether the newest event of the batch ended up as the
//! newest event of the whole timeline, and trims the opposite end.

mod query;
mod trim;

pub use query::TimelineStats;

use crate::event::{Event, FixupContext};
use crate::types::{Direction, Generation, RoomId, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::ops::Index;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Default number of retained non-state events.
pub const DEFAULT_LIMIT: usize = 64;

/// Timeline options. A room may override these on creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineOptions {
    /// Number of non-state events kept after each insertion, trimmed on the
    /// side opposite to the insertion. Zero disables trimming.
    pub limit: usize,

    /// Ask for history whenever the timeline holds fewer than `limit`
    /// non-state events.
    pub autofill: bool,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            autofill: true,
        }
    }
}

/// What a single insertion did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Events newly added (before trimming).
    pub added: usize,
    /// Inputs that were already present or repeated within the batch.
    pub duplicates: usize,
    /// Inputs rejected at the boundary.
    pub skipped: usize,
    /// Events evicted by the trim.
    pub trimmed: usize,
    /// Inferred direction; `None` if nothing usable was inserted.
    pub direction: Option<Direction>,
    /// Timeline generation after the insertion.
    pub generation: Generation,
}

/// Process-unique identity of one timeline instance.
///
/// Generations restart at zero for every timeline, so caches over a
/// timeline key on this as well.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimelineId(u64);

impl TimelineId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TimelineId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
struct HorizonCache {
    generation: Option<Generation>,
    index: usize,
}

/// Ordered, deduplicated sequence of events for one room.
#[derive(Debug)]
pub struct Timeline {
    id: TimelineId,
    room_id: Option<RoomId>,
    events: Vec<Event>,
    opts: TimelineOptions,

    /// Bumped on every structural mutation; cache validity token.
    modified: Generation,

    /// Wall-clock time of the last mutation.
    modified_at: Timestamp,

    horizon_cache: Mutex<HorizonCache>,
}

impl Timeline {
    /// Create an empty timeline not bound to a room.
    pub fn new(opts: TimelineOptions) -> Self {
        Self {
            id: TimelineId::next(),
            room_id: None,
            events: Vec::new(),
            opts,
            modified: Generation::default(),
            modified_at: Timestamp::default(),
            horizon_cache: Mutex::new(HorizonCache::default()),
        }
    }

    /// Create an empty timeline for a room. Events lacking a `room_id` get
    /// this one during fix-up.
    pub fn for_room(room_id: RoomId, opts: TimelineOptions) -> Self {
        Self {
            room_id: Some(room_id),
            ..Self::new(opts)
        }
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn opts(&self) -> &TimelineOptions {
        &self.opts
    }

    pub fn modified(&self) -> Generation {
        self.modified
    }

    pub fn modified_at(&self) -> Timestamp {
        self.modified_at
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    pub fn first(&self) -> Option<&Event> {
        self.events.first()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    /// Number of non-state events currently held.
    pub fn non_state_count(&self) -> usize {
        self.events.iter().filter(|e| !e.is_state()).count()
    }

    /// Index of the first non-state event, or the length if there is none.
    ///
    /// Cached against [`Timeline::modified`].
    pub fn horizon(&self) -> usize {
        let mut cache = self.horizon_cache.lock();
        if cache.generation != Some(self.modified) {
            cache.index = find_horizon(&self.events);
            cache.generation = Some(self.modified);
        }
        cache.index
    }

    /// Insert typed events using a default fix-up context.
    pub fn insert(&mut self, events: impl IntoIterator<Item = Event>) -> InsertOutcome {
        self.insert_with(events, &FixupContext::default())
    }

    /// Insert untyped JSON events, skipping anything that is not an event
    /// object.
    pub fn insert_raw(
        &mut self,
        values: impl IntoIterator<Item = Value>,
        ctx: &FixupContext<'_>,
    ) -> InsertOutcome {
        let mut skipped = 0;
        let events: Vec<Event> = values
            .into_iter()
            .filter_map(|value| match Event::from_value(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!(room_id = ?self.room_id, error = %e, "skipping malformed event");
                    skipped += 1;
                    None
                }
            })
            .collect();

        let mut outcome = self.insert_with(events, ctx);
        outcome.skipped = skipped;
        outcome
    }

    /// Insert a batch from any direction.
    ///
    /// Fixes up each event, merges and sorts, drops duplicate ids, trims the
    /// side opposite to the insertion and bumps the generation.
    pub fn insert_with(
        &mut self,
        events: impl IntoIterator<Item = Event>,
        ctx: &FixupContext<'_>,
    ) -> InsertOutcome {
        let ctx = FixupContext {
            room_id: ctx.room_id.or(self.room_id.as_ref()),
            ..*ctx
        };

        let mut batch: Vec<Event> = events
            .into_iter()
            .map(|mut event| {
                event.fix(&ctx);
                event
            })
            .collect();

        if batch.is_empty() {
            return InsertOutcome {
                generation: self.modified,
                ..Default::default()
            };
        }

        batch.sort_by(Event::cmp_order);
        let batch_len = batch.len();
        let batch_last = batch[batch_len - 1].event_id.clone();

        let before = self.events.len();
        self.events.append(&mut batch);
        self.events.sort_by(Event::cmp_order);
        self.unique();
        let added = self.events.len() - before;

        let direction = match self.events.last() {
            Some(last) if last.event_id != batch_last => Direction::Backward,
            _ => Direction::Forward,
        };

        let trimmed = self.trim(direction);
        self.touch();

        debug!(
            room_id = ?self.room_id,
            added,
            trimmed,
            direction = direction.as_str(),
            len = self.events.len(),
            "timeline insert"
        );

        InsertOutcome {
            added,
            duplicates: batch_len - added,
            skipped: 0,
            trimmed,
            direction: Some(direction),
            generation: self.modified,
        }
    }

    /// Drop repeated event ids, keeping the first occurrence in sort order.
    ///
    /// Copies of one event normally sort next to each other; the set also
    /// catches copies whose timestamps differ. Id-less events carry no
    /// identity and collapse only with an identical neighbour.
    fn unique(&mut self) {
        let mut seen = HashSet::with_capacity(self.events.len());
        let before = self.events.len();
        let mut kept: Vec<Event> = Vec::with_capacity(before);
        for event in self.events.drain(..) {
            let fresh = if event.event_id.as_str().is_empty() {
                kept.last() != Some(&event)
            } else {
                seen.insert(event.event_id.clone())
            };
            if fresh {
                kept.push(event);
            }
        }
        self.events = kept;
        if self.events.len() != before {
            trace!(removed = before - self.events.len(), "removed duplicate events");
        }
    }

    fn touch(&mut self) {
        self.modified = self.modified.next();
        self.modified_at = Timestamp::now();
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(TimelineOptions::default())
    }
}

impl Index<usize> for Timeline {
    type Output = Event;

    fn index(&self, index: usize) -> &Event {
        &self.events[index]
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Uncached horizon computation.
pub(crate) fn find_horizon(events: &[Event]) -> usize {
    events
        .iter()
        .position(|e| !e.is_state())
        .unwrap_or(events.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(id: &str, ts: i64) -> Event {
        Event::new(id, "m.room.message")
            .with_ts(ts)
            .with_content(json!({"body": id}))
    }

    fn create(ts: i64) -> Event {
        Event::new("$create", "m.room.create")
            .with_state_key("")
            .with_ts(ts)
            .with_content(json!({"creator": "@a:x"}))
    }

    fn ids(timeline: &Timeline) -> Vec<&str> {
        timeline.iter().map(|e| e.event_id.as_str()).collect()
    }

    #[test]
    fn test_insert_sorts_and_dedups() {
        let mut timeline = Timeline::default();
        timeline.insert(vec![message("$b", 20), message("$a", 10)]);
        let outcome = timeline.insert(vec![message("$a", 10), message("$c", 30)]);

        assert_eq!(ids(&timeline), vec!["$a", "$b", "$c"]);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.duplicates, 1);
    }

    #[test]
    fn test_dedup_catches_copies_with_different_timestamps() {
        let mut timeline = Timeline::default();
        timeline.insert(vec![message("$a", 10), message("$b", 20)]);
        timeline.insert(vec![message("$a", 30)]);

        assert_eq!(ids(&timeline), vec!["$a", "$b"]);
        assert_eq!(timeline[0].origin_server_ts, Some(10));
    }

    #[test]
    fn test_idless_events_kept_apart() {
        let mut timeline = Timeline::default();
        let idless = |ts| Event::new("", "m.room.message").with_ts(ts);
        timeline.insert(vec![idless(10), message("$m", 20), idless(30)]);
        assert_eq!(timeline.len(), 3);

        timeline.insert(vec![idless(30)]);
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut timeline = Timeline::default();
        let outcome = timeline.insert(Vec::new());
        assert_eq!(outcome.direction, None);
        assert_eq!(timeline.modified(), Generation(0));
    }

    #[test]
    fn test_first_insert_extends_present() {
        let mut timeline = Timeline::default();
        let outcome = timeline.insert(vec![create(100)]);
        assert_eq!(outcome.direction, Some(Direction::Forward));
        assert_eq!(timeline.horizon(), 1);
    }

    #[test]
    fn test_older_batch_extends_past() {
        let mut timeline = Timeline::default();
        timeline.insert(vec![message("$new", 500)]);
        let outcome = timeline.insert(vec![message("$old1", 50), message("$old2", 60)]);
        assert_eq!(outcome.direction, Some(Direction::Backward));
    }

    #[test]
    fn test_horizon_tracks_mutations() {
        let mut timeline = Timeline::default();
        assert_eq!(timeline.horizon(), 0);

        timeline.insert(vec![create(100)]);
        assert_eq!(timeline.horizon(), 1);

        timeline.insert(vec![message("$m", 200)]);
        assert_eq!(timeline.horizon(), 1);

        timeline.insert(vec![message("$early", 50)]);
        assert_eq!(timeline.horizon(), 0);
    }

    #[test]
    fn test_generation_bumps_per_insert() {
        let mut timeline = Timeline::default();
        let first = timeline.insert(vec![message("$a", 1)]).generation;
        let second = timeline.insert(vec![message("$b", 2)]).generation;
        assert!(second > first);
        assert_eq!(timeline.modified(), second);
    }

    #[test]
    fn test_fixup_assigns_room_and_time() {
        let mut timeline = Timeline::for_room(RoomId::new("!r:x"), TimelineOptions::default());
        timeline.insert(vec![Event::new("$a", "m.room.message")]);

        let event = &timeline[0];
        assert_eq!(event.room_id, Some(RoomId::new("!r:x")));
        assert!(event.origin_server_ts.is_some());
    }

    #[test]
    fn test_insert_raw_skips_malformed() {
        let mut timeline = Timeline::default();
        let outcome = timeline.insert_raw(
            vec![
                json!("not an event"),
                json!(42),
                json!({"content": {}}),
                json!({"event_id": "$ok", "type": "m.room.message", "origin_server_ts": 1}),
            ],
            &FixupContext::default(),
        );

        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.added, 1);
        assert_eq!(ids(&timeline), vec!["$ok"]);
    }
}
