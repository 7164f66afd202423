//! Subscription types for timeline change notifications.

use crate::timeline::InsertOutcome;
use crate::types::{Direction, Generation, Membership, RoomId};
use serde::{Deserialize, Serialize};

/// Buffer size used when a subscription does not set one.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered notices before dropping subscriber.
    /// None uses the owner's default.
    pub buffer_size: Option<usize>,

    /// Replay a snapshot of every matching room before going live.
    pub catch_up: bool,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: None,
            catch_up: true,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Filter by rooms (None = all rooms).
    pub room_ids: Option<Vec<RoomId>>,

    /// Include timeline insertions.
    pub include_timeline: bool,

    /// Include state invalidations.
    pub include_state: bool,

    /// Include membership changes.
    pub include_membership: bool,
}

impl SubscriptionFilter {
    /// Everything for the given rooms.
    pub fn rooms(room_ids: Vec<RoomId>) -> Self {
        Self {
            room_ids: Some(room_ids),
            ..Self::all()
        }
    }

    /// Timeline insertions only.
    pub fn timeline() -> Self {
        Self {
            include_timeline: true,
            ..Default::default()
        }
    }

    /// Membership changes only.
    pub fn membership() -> Self {
        Self {
            include_membership: true,
            ..Default::default()
        }
    }

    /// Subscribe to everything.
    pub fn all() -> Self {
        Self {
            room_ids: None,
            include_timeline: true,
            include_state: true,
            include_membership: true,
        }
    }

    pub(crate) fn matches_room(&self, room_id: &RoomId) -> bool {
        match &self.room_ids {
            Some(ids) => ids.contains(room_id),
            None => true,
        }
    }
}

/// Notices emitted to subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineNotice {
    /// Current shape of a room, sent during catch-up.
    Snapshot {
        room: RoomSnapshot,
    },

    /// A batch was inserted into a room's timeline.
    Inserted {
        room_id: RoomId,
        added: usize,
        trimmed: usize,
        direction: Direction,
        generation: Generation,
    },

    /// Cached state of one type was dropped.
    StateInvalidated {
        room_id: RoomId,
        event_type: String,
    },

    /// The local user's membership in a room changed.
    Membership {
        room_id: RoomId,
        membership: Membership,
    },

    /// Finished catch-up, now streaming live.
    CaughtUp,

    /// Subscription was dropped.
    Dropped {
        reason: DropReason,
    },
}

impl TimelineNotice {
    /// Notice for an insertion, if it did anything.
    pub fn inserted(room_id: &RoomId, outcome: &InsertOutcome) -> Option<Self> {
        let direction = outcome.direction?;
        if outcome.added == 0 && outcome.trimmed == 0 {
            return None;
        }
        Some(TimelineNotice::Inserted {
            room_id: room_id.clone(),
            added: outcome.added,
            trimmed: outcome.trimmed,
            direction,
            generation: outcome.generation,
        })
    }
}

/// Summary of a room (for catch-up).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub membership: Option<Membership>,
    pub len: usize,
    pub horizon: usize,
    pub generation: Generation,
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive notices.
    pub receiver: crossbeam_channel::Receiver<TimelineNotice>,
}

impl SubscriptionHandle {
    /// Receive the next notice (blocking).
    pub fn recv(&self) -> Result<TimelineNotice, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a notice (non-blocking).
    pub fn try_recv(&self) -> Result<TimelineNotice, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<TimelineNotice, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<TimelineNotice> {
        self.receiver.try_iter().collect()
    }
}
