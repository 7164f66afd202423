//! # Room Timeline
//!
//! Ordered, bounded room timelines with a derived view of room state.
//!
//! ## Core Concepts
//!
//! - **Timeline**: Events sorted by a total order, deduplicated, trimmed to a
//!   non-state budget on the side opposite to each insertion
//! - **Horizon**: Index of the first non-state event; the prefix before it is
//!   state that is kept regardless of the budget
//! - **State**: Read-only projection of the timeline, cached per state type
//!   and revalidated by timeline generation
//! - **Rooms**: A timeline plus pending local events and pagination cursors
//! - **Client**: Routes sync responses to rooms and broadcasts changes
//!
//! ## Example
//!
//! ```ignore
//! use room_timeline::{Client, ClientConfig, SyncResponse};
//!
//! let mut client = Client::new(ClientConfig::from_json(r#"{"user_id": "@me:x"}"#)?);
//! let response: SyncResponse = serde_json::from_str(body)?;
//! client.apply_sync(&response);
//!
//! let room = client.room(&"!room:x".into()).unwrap();
//! let topic = room.state().content().get("m.room.topic");
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod room;
pub mod state;
pub mod subscriptions;
pub mod sync;
pub mod timeline;
pub mod types;

// Re-exports
pub use client::{Client, ClientConfig};
pub use error::{Result, TimelineError};
pub use event::{Event, FixupContext, Unsigned};
pub use room::{PaginationTicket, PendingEvent, Room};
pub use state::{
    defaults_for, derive, summarize, ContentView, RoomSummary, State, StateMap, StateProjection,
};
pub use subscriptions::{
    DropReason, RoomSnapshot, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager, TimelineNotice, DEFAULT_BUFFER_SIZE,
};
pub use sync::{Page, PageRequest, PageSource, RoomSync, SyncResponse, SyncRooms};
pub use timeline::{InsertOutcome, Timeline, TimelineId, TimelineOptions, TimelineStats};
pub use types::*;
