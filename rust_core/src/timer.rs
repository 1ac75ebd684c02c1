//! Cancellable one-shot timers for a single-threaded event loop
//!
//! Timers are plain data: a deadline plus a key. Nothing sleeps here. The
//! driver asks for `next_deadline()`, sleeps until then, and pops whatever
//! is due. Cancelling removes the entry, so a cancelled timer can never fire.

use std::collections::BTreeMap;
use tokio::time::Instant;

/// Handle to a scheduled timer; ordering is (deadline, schedule order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle {
    deadline: Instant,
    seq: u64,
}

impl TimerHandle {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

#[derive(Debug)]
pub struct TimerQueue<K> {
    entries: BTreeMap<TimerHandle, K>,
    next_seq: u64,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: Instant, key: K) -> TimerHandle {
        let handle = TimerHandle {
            deadline,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(handle, key);
        handle
    }

    /// Remove a timer. `None` means it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<K> {
        self.entries.remove(&handle)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|h| h.deadline)
    }

    /// Pop the earliest timer whose deadline is at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerHandle, K)> {
        let handle = *self.entries.keys().next()?;
        if handle.deadline > now {
            return None;
        }
        self.entries.remove(&handle).map(|key| (handle, key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cancel everything, returning how many timers were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}
