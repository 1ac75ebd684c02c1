//! Coalescing scheduler for identified events
//!
//! Holds in-flight events keyed by event id. The first observation of an id
//! fixes its deadline; later observations only merge detail into the draft
//! (fixed delay, not a sliding debounce). At fire time the freshest feed
//! snapshot is overlaid one last time before the event is finalized.

use crate::error::EngineError;
use crate::fired_log::{FireRecord, FiredEventLog};
use crate::models::{Draft, EventKind, ScoreSignature};
use crate::timer::{TimerHandle, TimerQueue};
use log::{debug, info};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Late-binding read of the current feed state for one pending event
pub trait SnapshotSource {
    fn latest_detail(&self, event_id: &str, pending: &Draft) -> Option<Draft>;
}

/// Snapshot source with nothing to offer
pub struct NoSnapshot;

impl SnapshotSource for NoSnapshot {
    fn latest_detail(&self, _event_id: &str, _pending: &Draft) -> Option<Draft> {
        None
    }
}

/// Fired-log key for a goal known only by its score
fn signature_key(signature: &ScoreSignature) -> String {
    format!("score:{}", signature.score_str())
}

#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub event_id: String,
    pub draft: Draft,
    pub fire_at: Instant,
    pub handle: TimerHandle,
    /// Number of later observations merged into the draft
    pub merges: u32,
}

impl PendingEvent {
    pub fn kind(&self) -> EventKind {
        self.draft.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { fire_at: Instant },
    Merged { fire_at: Instant },
}

/// An event whose timer fired, ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedEvent {
    pub event_id: String,
    pub draft: Draft,
}

#[derive(Debug, Default)]
pub struct CoalescingScheduler {
    pending: HashMap<String, PendingEvent>,
    timers: TimerQueue<String>,
    fired: FiredEventLog,
}

impl CoalescingScheduler {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            timers: TimerQueue::new(),
            fired: FiredEventLog::new(),
        }
    }

    /// Schedule `event_id` to fire after `delay`, or merge into the pending draft
    pub fn schedule(
        &mut self,
        event_id: &str,
        draft: Draft,
        delay: Duration,
        now: Instant,
    ) -> Result<ScheduleOutcome, EngineError> {
        if self.fired.contains(event_id) {
            return Err(EngineError::DuplicateEvent(event_id.to_string()));
        }

        if let Some(pending) = self.pending.get_mut(event_id) {
            if !pending.draft.overlay(&draft) {
                return Err(EngineError::CorruptState(format!(
                    "event {} pending as {} but observed as {}",
                    event_id,
                    pending.kind().as_str(),
                    draft.kind().as_str()
                )));
            }
            pending.merges += 1;
            debug!(
                "Merged detail into pending {} {} (merge #{}, fires in {:.1}s)",
                pending.kind().as_str(),
                event_id,
                pending.merges,
                pending.fire_at.saturating_duration_since(now).as_secs_f64()
            );
            return Ok(ScheduleOutcome::Merged {
                fire_at: pending.fire_at,
            });
        }

        let fire_at = now + delay;
        let handle = self.timers.schedule(fire_at, event_id.to_string());
        info!(
            "Scheduled {} {} to fire in {:.1}s",
            draft.kind().as_str(),
            event_id,
            delay.as_secs_f64()
        );
        self.pending.insert(
            event_id.to_string(),
            PendingEvent {
                event_id: event_id.to_string(),
                draft,
                fire_at,
                handle,
                merges: 0,
            },
        );
        Ok(ScheduleOutcome::Scheduled { fire_at })
    }

    /// Cancel and remove a pending event
    pub fn cancel(&mut self, event_id: &str) -> Result<PendingEvent, EngineError> {
        let pending = self
            .pending
            .remove(event_id)
            .ok_or_else(|| EngineError::TimerCancelRace(event_id.to_string()))?;
        self.timers.cancel(pending.handle);
        debug!("Cancelled pending {} {}", pending.kind().as_str(), event_id);
        Ok(pending)
    }

    /// Mark an id as already satisfied without dispatching it
    pub fn mark_fired(&mut self, event_id: &str) -> FireRecord {
        if self.pending.contains_key(event_id) {
            let _ = self.cancel(event_id);
        }
        self.fired.record(event_id)
    }

    /// Record that a goal at `signature` went out, whichever path sent it
    pub fn mark_signature_fired(&mut self, signature: &ScoreSignature) -> FireRecord {
        self.fired.record(&signature_key(signature))
    }

    pub fn signature_fired(&self, signature: &ScoreSignature) -> bool {
        self.fired.contains(&signature_key(signature))
    }

    pub fn has_fired(&self, event_id: &str) -> bool {
        self.fired.contains(event_id)
    }

    pub fn is_pending(&self, event_id: &str) -> bool {
        self.pending.contains_key(event_id)
    }

    pub fn pending(&self, event_id: &str) -> Option<&PendingEvent> {
        self.pending.get(event_id)
    }

    /// Pending goal whose draft carries `signature`
    pub fn pending_goal_for(&self, signature: &ScoreSignature) -> Option<&PendingEvent> {
        self.pending
            .values()
            .find(|p| p.draft.goal_score().as_ref() == Some(signature))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Fire the earliest due event, if any
    pub fn fire_due(
        &mut self,
        now: Instant,
        snapshot: &dyn SnapshotSource,
    ) -> Result<Option<FinalizedEvent>, EngineError> {
        let (handle, event_id) = match self.timers.pop_due(now) {
            Some(due) => due,
            None => return Ok(None),
        };

        let mut pending = self.pending.remove(&event_id).ok_or_else(|| {
            EngineError::CorruptState(format!("timer fired for {} with no pending event", event_id))
        })?;
        if pending.handle != handle {
            return Err(EngineError::CorruptState(format!(
                "timer handle mismatch for pending {}",
                event_id
            )));
        }

        if let Some(fresh) = snapshot.latest_detail(&event_id, &pending.draft) {
            pending.draft.overlay(&fresh);
        }

        if self.fired.record(&event_id) == FireRecord::Duplicate {
            return Err(EngineError::DuplicateEvent(event_id));
        }

        Ok(Some(FinalizedEvent {
            event_id,
            draft: pending.draft,
        }))
    }

    /// Cancel everything and forget fired ids
    pub fn reset(&mut self) -> usize {
        let cancelled = self.timers.clear();
        self.pending.clear();
        self.fired.clear();
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GoalDraft, PenaltyDraft};

    fn goal(scorer: Option<&str>, score: (u16, u16)) -> Draft {
        Draft::Goal(GoalDraft {
            scorer: scorer.map(str::to_string),
            score: Some(ScoreSignature::new(score.0, score.1)),
            ..Default::default()
        })
    }

    struct FixedSnapshot(Draft);

    impl SnapshotSource for FixedSnapshot {
        fn latest_detail(&self, _event_id: &str, _pending: &Draft) -> Option<Draft> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn test_merge_keeps_original_deadline() {
        let t0 = Instant::now();
        let mut scheduler = CoalescingScheduler::new();

        let first = scheduler
            .schedule("55", goal(None, (2, 1)), Duration::from_secs(2), t0)
            .unwrap();
        assert_eq!(first, ScheduleOutcome::Scheduled { fire_at: t0 + Duration::from_secs(2) });

        let later = t0 + Duration::from_secs(1);
        let merged = scheduler
            .schedule("55", goal(Some("Matthews"), (2, 1)), Duration::from_secs(2), later)
            .unwrap();
        assert_eq!(merged, ScheduleOutcome::Merged { fire_at: t0 + Duration::from_secs(2) });
        assert_eq!(scheduler.next_deadline(), Some(t0 + Duration::from_secs(2)));
        assert_eq!(scheduler.pending("55").unwrap().merges, 1);
    }

    #[test]
    fn test_fire_once_then_duplicate() {
        let t0 = Instant::now();
        let mut scheduler = CoalescingScheduler::new();
        scheduler
            .schedule("55", goal(Some("Matthews"), (1, 0)), Duration::from_secs(1), t0)
            .unwrap();

        assert!(scheduler.fire_due(t0, &NoSnapshot).unwrap().is_none());

        let fired = scheduler
            .fire_due(t0 + Duration::from_secs(1), &NoSnapshot)
            .unwrap()
            .unwrap();
        assert_eq!(fired.event_id, "55");
        assert!(scheduler.has_fired("55"));
        assert_eq!(scheduler.pending_count(), 0);

        let err = scheduler
            .schedule("55", goal(None, (1, 0)), Duration::from_secs(1), t0)
            .unwrap_err();
        assert_eq!(err, EngineError::DuplicateEvent("55".to_string()));
    }

    #[test]
    fn test_late_binding_overlay_at_fire_time() {
        let t0 = Instant::now();
        let mut scheduler = CoalescingScheduler::new();
        scheduler
            .schedule("55", goal(None, (1, 0)), Duration::from_secs(1), t0)
            .unwrap();

        let snapshot = FixedSnapshot(Draft::Goal(GoalDraft {
            scorer: Some("Auston Matthews".to_string()),
            assists: vec!["Mitch Marner".to_string()],
            ..Default::default()
        }));
        let fired = scheduler
            .fire_due(t0 + Duration::from_secs(1), &snapshot)
            .unwrap()
            .unwrap();

        match fired.draft {
            Draft::Goal(g) => {
                assert_eq!(g.scorer.as_deref(), Some("Auston Matthews"));
                assert_eq!(g.score, Some(ScoreSignature::new(1, 0)));
            }
            other => panic!("expected goal, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_and_race() {
        let t0 = Instant::now();
        let mut scheduler = CoalescingScheduler::new();
        scheduler
            .schedule("7", Draft::Penalty(PenaltyDraft::default()), Duration::from_secs(2), t0)
            .unwrap();

        assert!(scheduler.cancel("7").is_ok());
        assert_eq!(
            scheduler.cancel("7").unwrap_err(),
            EngineError::TimerCancelRace("7".to_string())
        );
        assert!(scheduler.fire_due(t0 + Duration::from_secs(5), &NoSnapshot).unwrap().is_none());
        assert!(!scheduler.has_fired("7"));
    }

    #[test]
    fn test_kind_mismatch_is_corrupt_state() {
        let t0 = Instant::now();
        let mut scheduler = CoalescingScheduler::new();
        scheduler
            .schedule("9", goal(None, (1, 0)), Duration::from_secs(1), t0)
            .unwrap();
        let err = scheduler
            .schedule("9", Draft::Penalty(PenaltyDraft::default()), Duration::from_secs(1), t0)
            .unwrap_err();
        assert_eq!(err.kind(), "corrupt_state");
    }

    #[test]
    fn test_pending_goal_for_and_reset() {
        let t0 = Instant::now();
        let mut scheduler = CoalescingScheduler::new();
        scheduler
            .schedule("55", goal(None, (2, 1)), Duration::from_secs(1), t0)
            .unwrap();
        scheduler.mark_fired("40");
        scheduler.mark_signature_fired(&ScoreSignature::new(1, 0));
        assert!(scheduler.signature_fired(&ScoreSignature::new(1, 0)));
        assert!(!scheduler.has_fired("55"));

        assert!(scheduler.pending_goal_for(&ScoreSignature::new(2, 1)).is_some());
        assert!(scheduler.pending_goal_for(&ScoreSignature::new(1, 1)).is_none());

        assert_eq!(scheduler.reset(), 1);
        assert!(!scheduler.has_fired("40"));
        assert!(!scheduler.signature_fired(&ScoreSignature::new(1, 0)));
        assert!(scheduler.next_deadline().is_none());
    }
}
