//! Read-only queries over a timeline.

use super::Timeline;
use crate::event::{domain_of, Event};
use serde::Serialize;

/// Summary counters for a timeline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TimelineStats {
    pub total: usize,
    pub types: usize,
    pub state: usize,
    pub servers: usize,
    pub horizon: usize,
}

impl Timeline {
    /// Indices of events passing `filter`, youngest first, at most `limit`.
    pub fn query<F>(&self, mut filter: F, limit: usize) -> Vec<usize>
    where
        F: FnMut(&Event, usize) -> bool,
    {
        let mut ret = Vec::new();
        for (i, event) in self.events.iter().enumerate().rev() {
            if ret.len() >= limit {
                break;
            }
            if filter(event, i) {
                ret.push(i);
            }
        }
        ret
    }

    /// Index of the most recent event passing `filter`.
    pub fn current<F>(&self, filter: F) -> Option<usize>
    where
        F: FnMut(&Event, usize) -> bool,
    {
        self.query(filter, 1).first().copied()
    }

    /// The most recent event passing `filter`.
    pub fn current_event<F>(&self, filter: F) -> Option<&Event>
    where
        F: FnMut(&Event, usize) -> bool,
    {
        self.current(filter).map(|i| &self.events[i])
    }

    /// Linear search by event id.
    pub fn get(&self, event_id: &str) -> Option<&Event> {
        self.pos(event_id).map(|i| &self.events[i])
    }

    pub fn pos(&self, event_id: &str) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.event_id.as_str() == event_id)
    }

    pub fn has(&self, event_id: &str) -> bool {
        self.pos(event_id).is_some()
    }

    pub fn has_type(&self, event_type: &str) -> bool {
        self.events.iter().any(|e| e.is_type(event_type))
    }

    /// Tally events passing `condition`.
    pub fn count<F>(&self, condition: F) -> usize
    where
        F: Fn(&Event) -> bool,
    {
        self.events.iter().filter(|&e| condition(e)).count()
    }

    pub fn horizon_event(&self) -> Option<&Event> {
        self.events.get(self.horizon())
    }

    /// Length of the mixed section from the horizon onward.
    pub fn window(&self) -> usize {
        self.events.len() - self.horizon()
    }

    /// Distinct event types in order of first appearance.
    pub fn types(&self) -> Vec<&str> {
        let mut ret: Vec<&str> = Vec::new();
        for event in &self.events {
            if !ret.contains(&event.event_type.as_str()) {
                ret.push(&event.event_type);
            }
        }
        ret
    }

    /// Distinct sender servers in order of first appearance.
    pub fn servers(&self) -> Vec<&str> {
        let mut ret: Vec<&str> = Vec::new();
        for domain in self.events.iter().filter_map(Event::sender_domain) {
            if !ret.contains(&domain) {
                ret.push(domain);
            }
        }
        ret
    }

    pub fn filter_by_sender(&self, user_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.sender.as_deref() == Some(user_id))
            .collect()
    }

    pub fn filter_by_server(&self, hostname: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.sender.as_deref().and_then(domain_of) == Some(hostname))
            .collect()
    }

    pub fn stats(&self) -> TimelineStats {
        TimelineStats {
            total: self.events.len(),
            types: self.types().len(),
            state: self.count(Event::is_state),
            servers: self.servers().len(),
            horizon: self.horizon(),
        }
    }
}
