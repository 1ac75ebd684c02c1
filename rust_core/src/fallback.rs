//! Scoreboard fallback for goals without an event id
//!
//! A bare score increase schedules a timer keyed by the new score signature.
//! If an identified report of the same goal gets dispatched first, the
//! suppression window swallows the fallback at fire time.

use crate::models::ScoreSignature;
use crate::resolver::GoalSide;
use crate::suppression::SuppressionWindow;
use crate::timer::{TimerHandle, TimerQueue};
use log::{debug, info};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingFallback {
    pub signature: ScoreSignature,
    pub prior: ScoreSignature,
    pub side: GoalSide,
    pub period_ord: Option<String>,
    pub time_remaining: Option<String>,
    pub fire_at: Instant,
    handle: TimerHandle,
}

/// Context captured when the delta was seen
#[derive(Debug, Clone, Default)]
pub struct DeltaContext {
    pub period_ord: Option<String>,
    pub time_remaining: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome {
    Fire(PendingFallback),
    /// Already dispatched by another path; dropped without dispatch
    Suppressed(ScoreSignature),
}

#[derive(Debug, Default)]
pub struct ScoreboardFallback {
    pending: HashMap<ScoreSignature, PendingFallback>,
    timers: TimerQueue<ScoreSignature>,
}

impl ScoreboardFallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a fallback for `current`. Returns the deadline, or `None`
    /// when one is already pending for that signature.
    pub fn on_score_delta(
        &mut self,
        prior: ScoreSignature,
        current: ScoreSignature,
        side: GoalSide,
        context: DeltaContext,
        delay: Duration,
        now: Instant,
    ) -> Option<Instant> {
        if self.pending.contains_key(&current) {
            debug!("Fallback for {} already pending", current);
            return None;
        }

        let fire_at = now + delay;
        let handle = self.timers.schedule(fire_at, current);
        info!(
            "Scoreboard fallback {} -> {} scheduled in {:.1}s",
            prior,
            current,
            delay.as_secs_f64()
        );
        self.pending.insert(
            current,
            PendingFallback {
                signature: current,
                prior,
                side,
                period_ord: context.period_ord,
                time_remaining: context.time_remaining,
                fire_at,
                handle,
            },
        );
        Some(fire_at)
    }

    /// Cancel a pending fallback; `None` if nothing was pending
    pub fn cancel(&mut self, signature: &ScoreSignature) -> Option<PendingFallback> {
        let pending = self.pending.remove(signature)?;
        self.timers.cancel(pending.handle);
        debug!("Cancelled scoreboard fallback for {}", signature);
        Some(pending)
    }

    pub fn is_pending(&self, signature: &ScoreSignature) -> bool {
        self.pending.contains_key(signature)
    }

    pub fn pending_for(&self, signature: &ScoreSignature) -> Option<&PendingFallback> {
        self.pending.get(signature)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Pop the earliest due fallback, checking suppression first
    pub fn fire_due(&mut self, now: Instant, suppression: &SuppressionWindow) -> Option<FallbackOutcome> {
        let (handle, signature) = self.timers.pop_due(now)?;
        let pending = match self.pending.remove(&signature) {
            Some(p) if p.handle == handle => p,
            Some(p) => {
                // Stale timer for a replaced entry; put the live one back
                self.pending.insert(signature, p);
                return None;
            }
            None => return None,
        };

        if suppression.is_suppressed(&signature, now) {
            debug!("Scoreboard fallback for {} suppressed", signature);
            return Some(FallbackOutcome::Suppressed(signature));
        }
        Some(FallbackOutcome::Fire(pending))
    }

    pub fn reset(&mut self) -> usize {
        self.pending.clear();
        self.timers.clear()
    }
}
