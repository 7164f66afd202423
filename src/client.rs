//! Client tying rooms, sync routing and notifications together.

use crate::error::{Result, TimelineError};
use crate::event::Event;
use crate::room::Room;
use crate::subscriptions::{
    RoomSnapshot, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
    DEFAULT_BUFFER_SIZE,
};
use crate::sync::{PageSource, RoomSync, SyncResponse};
use crate::timeline::{InsertOutcome, TimelineOptions};
use crate::types::{Direction, EventId, Membership, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// The local user, used to infer own membership and sign local events.
    pub user_id: Option<String>,

    /// Timeline options for rooms created by the client.
    pub timeline: TimelineOptions,

    /// Buffer size for subscriptions created through [`Client::subscribe`]
    /// that leave `buffer_size` unset.
    pub subscription_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            timeline: TimelineOptions::default(),
            subscription_buffer: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ClientConfig {
    /// Parse a config, taking defaults for anything not given.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Registry of rooms owned by one client.
///
/// Provides a unified interface for:
/// - Routing sync responses to rooms
/// - Local pseudo rooms
/// - Pagination and pending events per room
/// - Broadcasting timeline changes to subscribers
pub struct Client {
    config: ClientConfig,
    rooms: HashMap<RoomId, Room>,
    subscriptions: SubscriptionManager,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            rooms: HashMap::new(),
            subscriptions: SubscriptionManager::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user_id(&self) -> Option<&str> {
        self.config.user_id.as_deref()
    }

    // --- Registry ---

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Get a room, creating an empty network room if unknown.
    pub fn get_or_create_room(&mut self, room_id: &RoomId) -> &mut Room {
        let config = &self.config;
        self.rooms.entry(room_id.clone()).or_insert_with(|| {
            debug!(room_id = %room_id, "created room");
            let room = Room::new(room_id.clone(), config.timeline.clone());
            match &config.user_id {
                Some(user_id) => room.with_user(user_id.clone()),
                None => room,
            }
        })
    }

    /// Create a client-only room owned by the local user.
    pub fn create_local_room(&mut self, room_id: RoomId) -> Result<&mut Room> {
        if self.rooms.contains_key(&room_id) {
            return Err(TimelineError::InvalidOperation(format!(
                "room {room_id} already exists"
            )));
        }

        let room = Room::local(
            room_id.clone(),
            self.config.user_id.clone(),
            self.config.timeline.clone(),
        );
        info!(room_id = %room_id, "created local room");
        self.subscriptions.broadcast_membership(&room_id, Membership::Join);
        self.subscriptions
            .broadcast_insert(&room_id, &last_insert(&room));
        Ok(self.rooms.entry(room_id).or_insert(room))
    }

    /// Forget a room entirely.
    pub fn remove_room(&mut self, room_id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(room_id);
        if room.is_some() {
            debug!(room_id = %room_id, "removed room");
        }
        room
    }

    /// Rooms the local user currently has `membership` in, by room id.
    pub fn rooms_in(&self, membership: Membership) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self
            .rooms
            .values()
            .filter(|r| r.membership() == Some(membership))
            .collect();
        rooms.sort_by(|a, b| a.id().cmp(b.id()));
        rooms
    }

    /// All rooms, most recently modified first.
    pub fn rooms_by_activity(&self) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self.rooms.values().collect();
        rooms.sort_by(|a, b| {
            b.timeline()
                .modified_at()
                .cmp(&a.timeline().modified_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        rooms
    }

    // --- Timeline changes ---

    /// Insert events into a known room.
    pub fn insert(
        &mut self,
        room_id: &RoomId,
        events: impl IntoIterator<Item = Event>,
    ) -> Result<InsertOutcome> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| TimelineError::RoomNotFound(room_id.clone()))?;
        let outcome = room.insert(events);
        self.subscriptions.broadcast_insert(room_id, &outcome);
        Ok(outcome)
    }

    /// Route every room of a sync response, creating rooms as needed.
    ///
    /// Ephemeral and account data stay in the response for other consumers.
    pub fn apply_sync(&mut self, response: &SyncResponse) -> Vec<(RoomId, InsertOutcome)> {
        let rooms = &response.rooms;
        let routed = rooms
            .join
            .iter()
            .map(|(id, batch)| (id, batch, Membership::Join))
            .chain(rooms.invite.iter().map(|(id, batch)| (id, batch, Membership::Invite)))
            .chain(rooms.leave.iter().map(|(id, batch)| (id, batch, Membership::Leave)));

        let mut outcomes = Vec::new();
        for (room_id, batch, action) in routed {
            let outcome = self.sync_room(room_id, batch, action);
            outcomes.push((room_id.clone(), outcome));
        }

        debug!(
            rooms = outcomes.len(),
            next_batch = response.next_batch.as_deref().unwrap_or(""),
            "applied sync"
        );
        outcomes
    }

    fn sync_room(&mut self, room_id: &RoomId, batch: &RoomSync, action: Membership) -> InsertOutcome {
        let room = self.get_or_create_room(room_id);
        let previous = room.membership();
        let outcome = room.sync(batch, action);

        if previous != Some(action) {
            info!(room_id = %room_id, membership = %action, "membership changed");
            self.subscriptions.broadcast_membership(room_id, action);
        }
        self.subscriptions.broadcast_insert(room_id, &outcome);
        outcome
    }

    /// Fetch and apply one page of a room's history.
    pub fn paginate(
        &mut self,
        room_id: &RoomId,
        source: &impl PageSource,
        direction: Direction,
        limit: usize,
    ) -> Result<InsertOutcome> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| TimelineError::RoomNotFound(room_id.clone()))?;
        let outcome = room.paginate(source, direction, limit)?;
        self.subscriptions.broadcast_insert(room_id, &outcome);
        Ok(outcome)
    }

    /// Confirm a pending local event in a room.
    pub fn confirm(
        &mut self,
        room_id: &RoomId,
        transaction_id: &str,
        event_id: EventId,
    ) -> Result<InsertOutcome> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| TimelineError::RoomNotFound(room_id.clone()))?;
        let outcome = room.confirm(transaction_id, event_id)?;
        self.subscriptions.broadcast_insert(room_id, &outcome);
        Ok(outcome)
    }

    /// Drop a room's cached state of one type.
    pub fn invalidate(&self, room_id: &RoomId, event_type: &str) -> Result<()> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| TimelineError::RoomNotFound(room_id.clone()))?;
        room.invalidate(event_type);
        self.subscriptions.broadcast_invalidated(room_id, event_type);
        Ok(())
    }

    // --- Subscriptions ---

    /// Subscribe to timeline notices.
    ///
    /// With `catch_up` set, the handle first receives one snapshot per
    /// matching room, then `CaughtUp`.
    pub fn subscribe(&self, mut config: SubscriptionConfig) -> Result<SubscriptionHandle> {
        let buffer = *config
            .buffer_size
            .get_or_insert(self.config.subscription_buffer);
        if buffer == 0 {
            return Err(TimelineError::InvalidOperation(
                "subscription buffer must be non-zero".into(),
            ));
        }

        let handle = self.subscriptions.subscribe(config);
        if self.subscriptions.wants_catch_up(handle.id) {
            let mut rooms: Vec<&Room> = self.rooms.values().collect();
            rooms.sort_by(|a, b| a.id().cmp(b.id()));
            self.subscriptions
                .catch_up(handle.id, rooms.into_iter().map(snapshot))?;
        }
        self.subscriptions.mark_caught_up(handle.id)?;
        Ok(handle)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

fn snapshot(room: &Room) -> RoomSnapshot {
    let timeline = room.timeline();
    RoomSnapshot {
        room_id: room.id().clone(),
        membership: room.membership(),
        len: timeline.len(),
        horizon: timeline.horizon(),
        generation: timeline.modified(),
    }
}

/// Outcome describing a freshly seeded local room.
fn last_insert(room: &Room) -> InsertOutcome {
    let timeline = room.timeline();
    InsertOutcome {
        added: timeline.len(),
        direction: Some(Direction::Forward),
        generation: timeline.modified(),
        ..Default::default()
    }
}
