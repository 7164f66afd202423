//! Room composition: one timeline, the state projection over it, pending
//! local events and pagination cursors.

mod pagination;
mod pending;

pub use pagination::PaginationTicket;
pub use pending::PendingEvent;

use crate::event::{Event, FixupContext};
use crate::state::{summarize, RoomSummary, State, StateProjection};
use crate::sync::RoomSync;
use crate::timeline::{InsertOutcome, Timeline, TimelineOptions};
use crate::types::{Direction, Membership, RoomId, Timestamp};
use pagination::Cursors;
use pending::PendingEvents;
use serde_json::{json, Value};
use tracing::debug;

/// A single room.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    user_id: Option<String>,
    local: bool,
    membership: Option<Membership>,
    timeline: Timeline,
    state: StateProjection,
    pending: PendingEvents,
    cursors: Cursors,
}

impl Room {
    /// Create an empty network room.
    pub fn new(id: RoomId, opts: TimelineOptions) -> Self {
        Self {
            timeline: Timeline::for_room(id.clone(), opts),
            id,
            user_id: None,
            local: false,
            membership: None,
            state: StateProjection::new(),
            pending: PendingEvents::default(),
            cursors: Cursors::default(),
        }
    }

    /// Create a client-only room, seeded with a synthetic `m.room.create`
    /// event if it has none.
    pub fn local(id: RoomId, creator: Option<String>, opts: TimelineOptions) -> Self {
        let mut room = Self::new(id, opts);
        room.local = true;
        room.membership = Some(Membership::Join);
        room.user_id = creator;
        room.seed_create();
        room
    }

    /// Set the local user, used for membership inference and as the sender
    /// of confirmed local events.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn seed_create(&mut self) {
        if self.timeline.has_type("m.room.create") {
            return;
        }

        let mut create = Event::new(format!("$create/{}", self.id), "m.room.create")
            .with_state_key("")
            .with_content(json!({ "creator": self.user_id }));
        create.sender = self.user_id.clone();
        self.insert(vec![create]);
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn membership(&self) -> Option<Membership> {
        self.membership
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Current state, read through the projection.
    pub fn state(&self) -> State<'_> {
        self.state.view(&self.timeline)
    }

    pub fn summary(&self) -> RoomSummary {
        summarize(&self.state())
    }

    /// Drop the cached state of one type.
    pub fn invalidate(&self, event_type: &str) {
        self.state.invalidate(event_type)
    }

    /// Insert typed events. Own membership is only inferred under a sync
    /// action, never here.
    pub fn insert(&mut self, events: impl IntoIterator<Item = Event>) -> InsertOutcome {
        let ctx = fixup(&self.id, self.user_id.as_deref(), None);
        self.timeline.insert_with(events, &ctx)
    }

    /// Insert untyped events as received from the network.
    pub fn insert_raw(&mut self, values: impl IntoIterator<Item = Value>) -> InsertOutcome {
        let ctx = fixup(&self.id, self.user_id.as_deref(), None);
        self.timeline.insert_raw(values, &ctx)
    }

    /// Apply one room's slice of a sync response under `action`.
    ///
    /// `state` and `timeline` go in as one batch; `prev_batch` seeds the
    /// backward cursor if none is known yet.
    pub fn sync(&mut self, batch: &RoomSync, action: Membership) -> InsertOutcome {
        self.membership = Some(action);
        if let Some(prev_batch) = &batch.prev_batch {
            self.cursors.seed(Direction::Backward, prev_batch);
        }

        let ctx = fixup(&self.id, self.user_id.as_deref(), Some(action));
        let values: Vec<Value> = batch.timeline_events().cloned().collect();
        let outcome = self.timeline.insert_raw(values, &ctx);

        debug!(
            room_id = %self.id,
            action = %action,
            added = outcome.added,
            skipped = outcome.skipped,
            "applied room sync"
        );
        outcome
    }
}

fn fixup<'a>(
    room_id: &'a RoomId,
    user_id: Option<&'a str>,
    action: Option<Membership>,
) -> FixupContext<'a> {
    FixupContext {
        room_id: Some(room_id),
        user_id,
        action,
        now: Timestamp::now(),
    }
}
