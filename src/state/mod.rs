//! Current room state derived from the timeline.
//!
//! The timeline is the single source of truth. [`StateProjection`] memoizes
//! the latest event per `(type, state_key)` and rebuilds a type whenever the
//! timeline has been modified since that type was last derived. So long as
//! the timeline stays ordered, the state read through the projection is
//! accurate.

mod defaults;
mod projection;
mod summary;

use crate::event::Event;
use std::collections::BTreeMap;

/// `state_key -> event` for one event type.
pub type StateMap = BTreeMap<String, Event>;

pub use defaults::{defaults_for, SEEDED_TYPES};
pub use projection::{derive, ContentView, State, StateProjection};
pub use summary::{summarize, RoomSummary};
