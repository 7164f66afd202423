//! Size bounding for timelines.
//!
//! The budget counts non-state events only. Growth toward the present evicts
//! from the oldest end, where state events are kept and collapse into the
//! prefix before the horizon. Growth into history evicts from the newest end,
//! which is disposable while the user is scrolled away from it.

use super::{find_horizon, Timeline};
use crate::types::Direction;
use tracing::trace;

impl Timeline {
    /// Trim the side opposite to `direction`. Returns the number of events
    /// removed.
    pub(crate) fn trim(&mut self, direction: Direction) -> usize {
        let limit = self.opts.limit;
        if limit == 0 {
            return 0;
        }

        let window = self.events.len() - find_horizon(&self.events);
        if window < limit {
            return 0;
        }

        let removed = match direction {
            Direction::Backward => self.trim_newest(limit),
            Direction::Forward => self.trim_oldest(limit),
        };

        if removed > 0 {
            trace!(
                room_id = ?self.room_id,
                removed,
                direction = direction.as_str(),
                "trimmed timeline"
            );
        }
        removed
    }

    /// Pop events off the tail until the non-state budget holds. State
    /// events at the tail go too.
    fn trim_newest(&mut self, limit: usize) -> usize {
        let mut non_state = self.non_state_count();
        let mut removed = 0;
        while non_state > limit {
            let Some(event) = self.events.pop() else {
                break;
            };
            if !event.is_state() {
                non_state -= 1;
            }
            removed += 1;
        }
        removed
    }

    /// Evict the oldest non-state events.
    ///
    /// Each eviction at the horizon lets the state events right behind it
    /// join the prefix. An absorbed state event supersedes any older event
    /// for the same (type, state_key) already in the prefix, and those are
    /// removed, so the prefix keeps one current event per slot.
    fn trim_oldest(&mut self, limit: usize) -> usize {
        let mut non_state = self.non_state_count();
        let mut removed = 0;
        while non_state > limit {
            let horizon = find_horizon(&self.events);
            if horizon == self.events.len() {
                break;
            }

            self.events.remove(horizon);
            non_state -= 1;
            removed += 1;

            let mut absorbed = horizon;
            let mut end = find_horizon(&self.events);
            while absorbed < end {
                let mut i = 0;
                while i < absorbed {
                    if self.events[i].same_state_slot(&self.events[absorbed]) {
                        self.events.remove(i);
                        absorbed -= 1;
                        end -= 1;
                        removed += 1;
                    } else {
                        i += 1;
                    }
                }
                absorbed += 1;
            }
        }
        removed
    }
}
