//! Work queue of pagination cursors shared by the fetch workers
//!
//! The frontier tracks three things under one lock: the FIFO queue of
//! cursors waiting for a worker, the set of cursors already sent to the
//! listing API, and the number of popped cursors still being processed.
//! Quiescence is reached when the queue is empty and nothing is in flight.

use std::collections::{HashSet, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::models::Cursor;

#[derive(Default)]
struct FrontierState {
    queue: VecDeque<Cursor>,
    consumed: HashSet<Cursor>,
    in_flight: usize,
    closed: bool,
}

impl FrontierState {
    fn is_quiescent(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }
}

/// Concurrent FIFO of cursors with duplicate-dispatch protection
#[derive(Default)]
pub struct CursorFrontier {
    state: Mutex<FrontierState>,
    /// Signalled when a cursor is pushed or the frontier closes
    available: Condvar,
    /// Signalled when quiescence may have been reached or the frontier closes
    idle: Condvar,
}

impl CursorFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    // Workers never panic while holding the lock mid-update, so a poisoned
    // state is still consistent.
    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a cursor; never blocks
    pub fn push(&self, cursor: Cursor) {
        let mut state = self.lock();
        state.queue.push_back(cursor);
        self.available.notify_one();
    }

    /// Take the next cursor, blocking until one is available
    ///
    /// Returns `None` once the frontier is closed. Every `Some` must be
    /// followed by exactly one [`mark_done`](Self::mark_done).
    pub fn pop(&self) -> Option<Cursor> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(cursor) = state.queue.pop_front() {
                state.in_flight += 1;
                return Some(cursor);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Record that a cursor is about to be sent to the listing API
    ///
    /// Returns `false` if the cursor was already claimed. The check and the
    /// insert happen under the same lock.
    pub fn claim(&self, cursor: &Cursor) -> bool {
        let mut state = self.lock();
        if state.consumed.contains(cursor) {
            return false;
        }
        state.consumed.insert(cursor.clone());
        true
    }

    /// Record that a popped cursor is fully processed, follow-on cursor included
    pub fn mark_done(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.is_quiescent() {
            self.idle.notify_all();
        }
    }

    /// Block until quiescence or until the frontier is closed
    ///
    /// Returns `true` on quiescence, `false` if the frontier was closed first.
    pub fn wait_quiescent(&self) -> bool {
        let mut state = self.lock();
        loop {
            if state.closed {
                return false;
            }
            if state.is_quiescent() {
                return true;
            }
            state = self
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close the frontier and wake every waiter
    ///
    /// Workers observe the close on their next `pop`, after finishing the
    /// cursor they hold.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.available.notify_all();
        self.idle.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of cursors waiting in the queue
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of popped cursors not yet marked done
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Number of distinct cursors claimed so far
    pub fn consumed_count(&self) -> usize {
        self.lock().consumed.len()
    }
}

/// Marks the held cursor done when dropped, including on unwind
///
/// Unwinding also closes the frontier: the panicking worker's follow-on
/// cursor is lost, and queued cursors may have no worker left to take them.
pub(crate) struct DoneGuard<'a> {
    frontier: &'a CursorFrontier,
}

impl<'a> DoneGuard<'a> {
    pub(crate) fn new(frontier: &'a CursorFrontier) -> Self {
        Self { frontier }
    }
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.frontier.mark_done();
        if std::thread::panicking() {
            self.frontier.close();
        }
    }
}
