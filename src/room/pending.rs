//! Locally issued events awaiting server confirmation.
//!
//! At most one event per type is pending at a time. A pending event is not
//! part of the timeline; it enters only once confirmed with the id the
//! server assigned.

use super::Room;
use crate::error::{Result, TimelineError};
use crate::event::Event;
use crate::timeline::InsertOutcome;
use crate::types::{EventId, Timestamp};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// A local event and its provisional transaction id.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingEvent {
    pub transaction_id: String,
    pub event: Event,
    pub issued_at: Timestamp,
}

#[derive(Debug, Default)]
pub(crate) struct PendingEvents {
    by_type: HashMap<String, PendingEvent>,
    next_txn: u64,
}

impl PendingEvents {
    fn next_transaction_id(&mut self, now: Timestamp) -> String {
        self.next_txn += 1;
        format!("m{}.{}", now.0, self.next_txn)
    }

    fn take(&mut self, transaction_id: &str) -> Option<PendingEvent> {
        let event_type = self
            .by_type
            .iter()
            .find(|(_, p)| p.transaction_id == transaction_id)
            .map(|(t, _)| t.clone())?;
        self.by_type.remove(&event_type)
    }
}

impl Room {
    /// Issue a local event. The returned event carries a provisional id
    /// (`~` + transaction id) that is never a valid persisted id.
    pub fn issue(
        &mut self,
        event_type: &str,
        state_key: Option<&str>,
        content: Value,
    ) -> Result<PendingEvent> {
        if self.pending.by_type.contains_key(event_type) {
            return Err(TimelineError::PendingConflict(event_type.to_string()));
        }

        let now = Timestamp::now();
        let transaction_id = self.pending.next_transaction_id(now);

        let mut event = Event::new(format!("~{transaction_id}"), event_type)
            .with_ts(now.0)
            .with_content(content);
        event.state_key = state_key.map(str::to_string);
        event.room_id = Some(self.id.clone());
        event.sender = self.user_id.clone();
        event.unsigned.transaction_id = Some(transaction_id.clone());

        let pending = PendingEvent {
            transaction_id,
            event,
            issued_at: now,
        };
        self.pending
            .by_type
            .insert(event_type.to_string(), pending.clone());

        debug!(room_id = %self.id, event_type, txn = %pending.transaction_id, "issued local event");
        Ok(pending)
    }

    /// Confirm a pending event with its server-assigned id and insert it.
    pub fn confirm(&mut self, transaction_id: &str, event_id: EventId) -> Result<InsertOutcome> {
        let pending = self
            .pending
            .take(transaction_id)
            .ok_or_else(|| TimelineError::PendingNotFound(transaction_id.to_string()))?;

        let mut event = pending.event;
        event.event_id = event_id;
        if self.user_id.is_some() {
            event.sender = self.user_id.clone();
        }

        Ok(self.insert(vec![event]))
    }

    /// Forget a pending event whose send failed.
    pub fn abandon(&mut self, transaction_id: &str) -> Result<PendingEvent> {
        self.pending
            .take(transaction_id)
            .ok_or_else(|| TimelineError::PendingNotFound(transaction_id.to_string()))
    }

    /// The pending event of a type, if any.
    pub fn pending(&self, event_type: &str) -> Option<&PendingEvent> {
        self.pending.by_type.get(event_type)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.by_type.len()
    }
}
