//! Fired-event log
//!
//! Remembers every event id dispatched during the current session so that
//! re-observations and late merges can never dispatch twice. Lives exactly
//! as long as the session; a reset clears it.

use log::debug;
use std::collections::HashSet;

/// Result of recording an event id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireRecord {
    /// First dispatch for this id
    New,
    /// Id already dispatched in this session
    Duplicate,
}

#[derive(Debug, Default)]
pub struct FiredEventLog {
    ids: HashSet<String>,
}

impl FiredEventLog {
    pub fn new() -> Self {
        Self {
            ids: HashSet::with_capacity(64),
        }
    }

    /// Record an id as dispatched
    pub fn record(&mut self, event_id: &str) -> FireRecord {
        if self.ids.insert(event_id.to_string()) {
            FireRecord::New
        } else {
            debug!("Event {} already recorded as fired", event_id);
            FireRecord::Duplicate
        }
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.ids.contains(event_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_then_duplicate() {
        let mut log = FiredEventLog::new();
        assert_eq!(log.record("55"), FireRecord::New);
        assert_eq!(log.record("55"), FireRecord::Duplicate);
        assert_eq!(log.record("56"), FireRecord::New);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut log = FiredEventLog::new();
        log.record("55");
        assert!(log.contains("55"));

        log.clear();
        assert!(log.is_empty());
        assert!(!log.contains("55"));
        assert_eq!(log.record("55"), FireRecord::New);
    }
}
