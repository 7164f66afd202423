//! Subscription manager for broadcasting timeline notices.

use crate::error::{Result, TimelineError};
use crate::timeline::InsertOutcome;
use crate::types::{Membership, RoomId};
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use super::types::{
    DropReason, RoomSnapshot, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
    TimelineNotice, DEFAULT_BUFFER_SIZE,
};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<TimelineNotice>,
    /// Whether catch-up is complete.
    caught_up: bool,
}

impl Subscription {
    /// Try to send a notice. Returns false if the buffer is full or the
    /// receiver is gone.
    fn try_send(&self, notice: TimelineNotice) -> bool {
        self.sender.try_send(notice).is_ok()
    }

    fn wants(&self, notice: &TimelineNotice) -> bool {
        let filter = &self.config.filter;
        match notice {
            TimelineNotice::Inserted { room_id, .. } => {
                filter.include_timeline && filter.matches_room(room_id)
            }
            TimelineNotice::StateInvalidated { room_id, .. } => {
                filter.include_state && filter.matches_room(room_id)
            }
            TimelineNotice::Membership { room_id, .. } => {
                filter.include_membership && filter.matches_room(room_id)
            }
            TimelineNotice::Snapshot { room } => filter.matches_room(&room.room_id),
            TimelineNotice::CaughtUp | TimelineNotice::Dropped { .. } => true,
        }
    }
}

/// Manages subscriptions and broadcasts notices.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    ///
    /// The subscription receives no live notices until it is marked caught
    /// up.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE));

        let subscription = Subscription {
            config,
            sender,
            caught_up: false,
        };

        self.subscriptions.write().insert(id, subscription);

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Best effort
            let _ = sub.sender.try_send(TimelineNotice::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Send catch-up snapshots for matching rooms directly to one
    /// subscription.
    pub fn catch_up(
        &self,
        id: SubscriptionId,
        rooms: impl IntoIterator<Item = RoomSnapshot>,
    ) -> Result<()> {
        let mut subs = self.subscriptions.write();
        let Some(sub) = subs.get(&id) else {
            return Ok(());
        };

        for room in rooms {
            let notice = TimelineNotice::Snapshot { room };
            if sub.wants(&notice) && !sub.try_send(notice) {
                subs.remove(&id);
                return Err(TimelineError::SubscriptionDropped);
            }
        }
        Ok(())
    }

    /// Mark a subscription as caught up (finished catch-up).
    pub fn mark_caught_up(&self, id: SubscriptionId) -> Result<()> {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.get_mut(&id) {
            sub.caught_up = true;
            if !sub.try_send(TimelineNotice::CaughtUp) {
                subs.remove(&id);
                return Err(TimelineError::SubscriptionDropped);
            }
        }
        Ok(())
    }

    /// Whether `id` wants catch-up snapshots.
    pub fn wants_catch_up(&self, id: SubscriptionId) -> bool {
        self.subscriptions
            .read()
            .get(&id)
            .is_some_and(|s| s.config.catch_up)
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    // --- Broadcasting ---

    /// Broadcast an insertion, if it changed the timeline.
    pub fn broadcast_insert(&self, room_id: &RoomId, outcome: &InsertOutcome) {
        if let Some(notice) = TimelineNotice::inserted(room_id, outcome) {
            self.broadcast(notice);
        }
    }

    /// Broadcast a state invalidation.
    pub fn broadcast_invalidated(&self, room_id: &RoomId, event_type: &str) {
        self.broadcast(TimelineNotice::StateInvalidated {
            room_id: room_id.clone(),
            event_type: event_type.to_string(),
        });
    }

    /// Broadcast a membership change.
    pub fn broadcast_membership(&self, room_id: &RoomId, membership: Membership) {
        self.broadcast(TimelineNotice::Membership {
            room_id: room_id.clone(),
            membership,
        });
    }

    /// Internal broadcast helper. Drops subscribers that fail to receive.
    fn broadcast(&self, notice: TimelineNotice) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if sub.caught_up && sub.wants(&notice) && !sub.try_send(notice.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    warn!(subscription = id.0, "dropping slow subscriber");
                    // Might fail, that's ok
                    let _ = sub.sender.try_send(TimelineNotice::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
