//! Scrollback and scroll-forward cursors.
//!
//! Requests may overlap. Every request takes a ticket; a response always
//! inserts its events (insertion is idempotent) but moves the cursor only if
//! no newer ticket for that direction has moved it already.

use super::Room;
use crate::error::Result;
use crate::sync::{Page, PageRequest, PageSource};
use crate::timeline::InsertOutcome;
use crate::types::Direction;
use tracing::{debug, trace};

/// Handle for one in-flight pagination request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaginationTicket {
    pub direction: Direction,
    seq: u64,
}

#[derive(Clone, Debug, Default)]
struct Cursor {
    token: Option<String>,
    /// Ticket that last wrote `token`; 0 for sync seeding.
    written_by: u64,
    /// Set once a page comes back empty.
    exhausted: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Cursors {
    next_seq: u64,
    backward: Cursor,
    forward: Cursor,
}

impl Cursors {
    fn cursor(&self, direction: Direction) -> &Cursor {
        match direction {
            Direction::Backward => &self.backward,
            Direction::Forward => &self.forward,
        }
    }

    fn cursor_mut(&mut self, direction: Direction) -> &mut Cursor {
        match direction {
            Direction::Backward => &mut self.backward,
            Direction::Forward => &mut self.forward,
        }
    }

    /// Set a cursor from sync if nothing has set it yet.
    pub(crate) fn seed(&mut self, direction: Direction, token: &str) {
        let cursor = self.cursor_mut(direction);
        if cursor.token.is_none() && !cursor.exhausted {
            cursor.token = Some(token.to_string());
        }
    }
}

impl Room {
    /// Pagination token for `direction`, if known.
    pub fn cursor(&self, direction: Direction) -> Option<&str> {
        self.cursors.cursor(direction).token.as_deref()
    }

    /// True once backward pagination has reached the start of the room.
    pub fn history_exhausted(&self) -> bool {
        self.cursors.backward.exhausted
    }

    /// Whether the timeline should ask for more history to fill its budget.
    pub fn needs_backfill(&self) -> bool {
        let opts = self.timeline.opts();
        opts.autofill
            && opts.limit > 0
            && !self.history_exhausted()
            && self.cursor(Direction::Backward).is_some()
            && self.timeline.non_state_count() < opts.limit
    }

    /// Start a pagination request from the current cursor.
    pub fn begin_pagination(
        &mut self,
        direction: Direction,
        limit: usize,
    ) -> (PaginationTicket, PageRequest) {
        self.cursors.next_seq += 1;
        let ticket = PaginationTicket {
            direction,
            seq: self.cursors.next_seq,
        };
        let request = PageRequest {
            from: self.cursor(direction).map(str::to_string),
            to: None,
            dir: direction,
            limit,
        };
        trace!(room_id = %self.id, seq = ticket.seq, dir = direction.as_str(), "pagination started");
        (ticket, request)
    }

    /// Apply the response to a pagination request.
    pub fn complete_pagination(&mut self, ticket: PaginationTicket, page: Page) -> InsertOutcome {
        let exhausted = page.chunk.is_empty();
        let outcome = self.insert_raw(page.chunk);

        let cursor = self.cursors.cursor_mut(ticket.direction);
        if ticket.seq > cursor.written_by {
            cursor.written_by = ticket.seq;
            if exhausted {
                cursor.token = None;
                cursor.exhausted = ticket.direction == Direction::Backward;
            } else {
                cursor.token = page.end;
            }
        } else {
            trace!(
                room_id = %self.id,
                seq = ticket.seq,
                newer = cursor.written_by,
                "stale pagination response; cursor kept"
            );
        }

        debug!(
            room_id = %self.id,
            dir = ticket.direction.as_str(),
            added = outcome.added,
            "pagination applied"
        );
        outcome
    }

    /// Fetch and apply one page synchronously.
    pub fn paginate(
        &mut self,
        source: &impl PageSource,
        direction: Direction,
        limit: usize,
    ) -> Result<InsertOutcome> {
        let (ticket, request) = self.begin_pagination(direction, limit);
        let page = source.fetch(&self.id, &request)?;
        Ok(self.complete_pagination(ticket, page))
    }
}
