use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;

/// Response-correlation queue shared between callers and the listener.
///
/// The listener inserts RPC responses keyed by message id; callers take the
/// first entry with their expected id, waiting up to the call timeout.
/// Unmatched entries stay queued until matched or the client is destroyed.
pub struct ResponseQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
}

struct QueueState {
    entries: VecDeque<(u32, Bytes)>,
    closed: bool,
}

/// Why a take returned without a response.
#[derive(Debug, PartialEq, Eq)]
pub enum TakeError {
    /// No entry with the expected id arrived within the wait.
    Timeout,
    /// The listener exited; no further responses can arrive.
    Closed,
}

impl ResponseQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Insert a response and wake all waiters to re-scan.
    pub fn push(&self, id: u32, message: Bytes) {
        let mut state = self.state.lock().expect("response queue lock poisoned");
        state.entries.push_back((id, message));
        self.cond.notify_all();
    }

    /// Remove and return the first entry with `id`, waiting up to `timeout`.
    pub fn take(&self, id: u32, timeout: Duration) -> Result<Bytes, TakeError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("response queue lock poisoned");

        loop {
            if let Some(pos) = state.entries.iter().position(|(entry_id, _)| *entry_id == id) {
                let (_, message) = state
                    .entries
                    .remove(pos)
                    .expect("position comes from the same scan");
                return Ok(message);
            }

            if state.closed {
                return Err(TakeError::Closed);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(TakeError::Timeout);
            }

            let (guard, _timed_out) = self
                .cond
                .wait_timeout(state, deadline - now)
                .expect("response queue lock poisoned");
            state = guard;
        }
    }

    /// Mark the queue closed and wake all waiters. Called when the listener
    /// exits.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("response queue lock poisoned");
        state.closed = true;
        self.cond.notify_all();
    }

    /// Whether the listener has exited.
    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .expect("response queue lock poisoned")
            .closed
    }

    /// Entries waiting to be matched.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("response queue lock poisoned")
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseQueue {
    fn default() -> Self {
        Self::new()
    }
}
