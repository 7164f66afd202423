//! Change notifications for timeline consumers.
//!
//! The rendering layer watches rooms through these subscriptions instead of
//! polling timelines:
//! - Timeline insertions (with trim counts and inferred direction)
//! - State invalidations
//! - Membership changes of the local user
//!
//! Subscriptions support filtering by room, an optional catch-up snapshot of
//! every matching room, and bounded buffers with slow-subscriber dropping.
//!
//! # Example
//!
//! ```ignore
//! let handle = client.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::rooms(vec![room_id.clone()]),
//!     ..Default::default()
//! })?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(TimelineNotice::Inserted { added, .. }) => redraw(added),
//!         Ok(TimelineNotice::CaughtUp) => println!("Now live!"),
//!         Ok(TimelineNotice::Dropped { .. }) | Err(_) => break,
//!         Ok(_) => {}
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, RoomSnapshot, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, TimelineNotice, DEFAULT_BUFFER_SIZE,
};
