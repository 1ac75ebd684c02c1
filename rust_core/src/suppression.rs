//! Suppression window keyed by score signature
//!
//! Raised whenever a goal is dispatched (from either path). While an entry is
//! live, any competing report of the same score signature is a duplicate.

use crate::models::ScoreSignature;
use log::debug;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionEntry {
    pub signature: ScoreSignature,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct SuppressionWindow {
    entries: HashMap<ScoreSignature, Instant>,
}

impl SuppressionWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `signature` until `now + ttl`. Re-raising extends the entry.
    pub fn raise(&mut self, signature: ScoreSignature, ttl: Duration, now: Instant) -> SuppressionEntry {
        let expires_at = now + ttl;
        self.entries.insert(signature, expires_at);
        debug!("Suppressing score {} for {:.1}s", signature, ttl.as_secs_f64());
        SuppressionEntry {
            signature,
            expires_at,
        }
    }

    pub fn is_suppressed(&self, signature: &ScoreSignature, now: Instant) -> bool {
        self.entries
            .get(signature)
            .map_or(false, |expires_at| now < *expires_at)
    }

    /// Drop expired entries, returning how many were removed
    pub fn prune(&mut self, now: Instant) -> usize {
        let initial_len = self.entries.len();
        self.entries.retain(|_, expires_at| now < *expires_at);

        let removed = initial_len - self.entries.len();
        if removed > 0 {
            debug!("Suppression cleanup: removed {} expired entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
