//! DualSourceListener: the reconciliation engine
//!
//! Owns every piece of session-scoped state and is driven by exactly two
//! kinds of call, both from one event loop:
//! - `observe_feed_a` / `observe_feed_b` for each inbound update
//! - `fire_due` whenever `next_deadline` has passed
//!
//! Nothing here sleeps or spawns. Timers are deadlines the driver waits on.

use crate::coalesce::{CoalescingScheduler, FinalizedEvent, ScheduleOutcome};
use crate::config::{dispatch_delay, BroadcastDelay, EngineConfig, StaticDelay};
use crate::detail::{match_goal_detail, parse_scorer_from_last_play, GoalQuery};
use crate::emitter::EventEmitter;
use crate::error::EngineError;
use crate::fallback::{DeltaContext, FallbackOutcome, PendingFallback, ScoreboardFallback};
use crate::lifecycle::{StartDetector, WinDetector};
use crate::models::{
    DispatchPath, Draft, EventHeader, EventKind, FeedAUpdate, FeedBUpdate, GameEvent, GoalDraft,
    GoalRecord, PenaltyDraft, PenaltyRecord, ScoreSignature, StartRecord, WinRecord,
};
use crate::observation::{LiveFeeds, Observation};
use crate::resolver::{resolve_goal_side, GoalEvidence, GoalSide, GoalSideBasis};
use crate::session::{GameSession, ResetReason, SessionChange, SessionState, SessionUpdate};
use crate::suppression::SuppressionWindow;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Scorer shown when no feed ever named one
pub const UNKNOWN_SCORER: &str = "a player";

/// Something the engine did in response to one observation
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    StartDispatched,
    Scheduled {
        event_id: String,
        kind: EventKind,
        fire_at: Instant,
    },
    Merged {
        event_id: String,
        fire_at: Instant,
    },
    FallbackScheduled {
        signature: ScoreSignature,
        fire_at: Instant,
    },
    FallbackCancelled(ScoreSignature),
    WinScheduled {
        fire_at: Instant,
    },
    /// Routine skip such as a duplicate id
    Skipped(EngineError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationReport {
    pub reset: Option<ResetReason>,
    pub actions: Vec<Action>,
}

impl ObservationReport {
    pub fn scheduled_ids(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Scheduled { event_id, .. } => Some(event_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub observations: u64,
    pub dropped: u64,
    pub dispatched: u64,
    pub resets: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DueTimer {
    Identified,
    Fallback,
    Win,
}

pub struct DualSourceListener {
    config: EngineConfig,
    broadcast: Arc<dyn BroadcastDelay>,
    tracked_team: Option<String>,
    missing_team_logged: bool,
    session: SessionState,
    feeds: LiveFeeds,
    scheduler: CoalescingScheduler,
    fallback: ScoreboardFallback,
    suppression: SuppressionWindow,
    win: WinDetector,
    start: StartDetector,
    emitter: EventEmitter,
    stats: EngineStats,
}

impl DualSourceListener {
    pub fn new(config: EngineConfig, emitter: EventEmitter) -> Self {
        let broadcast: Arc<dyn BroadcastDelay> = Arc::new(StaticDelay::new(config.broadcast_delay));
        let tracked_team = config
            .tracked_team
            .as_deref()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty());

        Self {
            config,
            broadcast,
            tracked_team,
            missing_team_logged: false,
            session: SessionState::new(),
            feeds: LiveFeeds::default(),
            scheduler: CoalescingScheduler::new(),
            fallback: ScoreboardFallback::new(),
            suppression: SuppressionWindow::new(),
            win: WinDetector::new(),
            start: StartDetector::new(),
            emitter,
            stats: EngineStats::default(),
        }
    }

    /// Replace the static broadcast delay with a dynamic source
    pub fn with_broadcast_delay(mut self, delay: Arc<dyn BroadcastDelay>) -> Self {
        self.broadcast = delay;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracked_team(&self) -> Option<&str> {
        self.tracked_team.as_deref()
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.session()
    }

    pub fn score(&self) -> ScoreSignature {
        self.session.score()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn pending_fallbacks(&self) -> usize {
        self.fallback.pending_count()
    }

    pub fn observe_feed_a(&mut self, update: FeedAUpdate, now: Instant) -> Result<ObservationReport, EngineError> {
        self.stats.observations += 1;
        let obs = Observation::from_feed_a(&update).map_err(|e| self.dropped(e))?;
        let report = self.observe(&obs, now)?;
        self.feeds.feed_a = Some(update);
        Ok(report)
    }

    pub fn observe_feed_b(&mut self, update: FeedBUpdate, now: Instant) -> Result<ObservationReport, EngineError> {
        self.stats.observations += 1;
        let obs = Observation::from_feed_b(&update).map_err(|e| self.dropped(e))?;
        let report = self.observe(&obs, now)?;
        self.feeds.feed_b = Some(update);
        Ok(report)
    }

    /// Manual team change: the current session is torn down entirely
    pub fn select_team(&mut self, abbrev: &str) -> bool {
        let abbrev = abbrev.trim().to_uppercase();
        if abbrev.is_empty() || self.tracked_team.as_deref() == Some(abbrev.as_str()) {
            return false;
        }
        info!(
            "Tracked team changed: {} -> {}",
            self.tracked_team.as_deref().unwrap_or("none"),
            abbrev
        );
        self.tracked_team = Some(abbrev);
        self.missing_team_logged = false;
        self.reset(ResetReason::TeamChange);
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.scheduler.next_deadline(),
            self.fallback.next_deadline(),
            self.win.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Fire every timer due at `now`, earliest first. Returns events dispatched.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let mut dispatched = 0;
        while let Some(due) = self.next_due(now) {
            let fired = match due {
                DueTimer::Identified => self.fire_identified(now),
                DueTimer::Fallback => self.fire_fallback(now),
                DueTimer::Win => self.fire_win(now),
            };
            if fired {
                dispatched += 1;
            }
        }
        self.suppression.prune(now);
        dispatched
    }

    /// Cancel every pending timer and forget the session
    pub fn reset(&mut self, reason: ResetReason) {
        self.clear_session_state(reason);
        self.session.clear();
    }

    // ========================================================================
    // Observation handling
    // ========================================================================

    fn observe(&mut self, obs: &Observation, now: Instant) -> Result<ObservationReport, EngineError> {
        let tracked = match &self.tracked_team {
            Some(team) => team.clone(),
            None => {
                if !self.missing_team_logged {
                    warn!("No tracked team configured; goal tracking disabled");
                    self.missing_team_logged = true;
                }
                self.stats.dropped += 1;
                return Err(EngineError::MissingConfig("tracked team".to_string()));
            }
        };

        let update = self.session.observe(obs, &tracked).map_err(|e| self.dropped(e))?;

        let mut report = ObservationReport::default();
        if let SessionChange::Reset(reason) = update.change {
            self.clear_session_state(reason);
            report.reset = Some(reason);
            // Whatever the feed already shows at baseline is history
            if let Some(id) = &obs.event_id {
                self.scheduler.mark_fired(id);
            }
        }

        let session = match self.session.session() {
            Some(session) => session.clone(),
            None => {
                return Err(EngineError::CorruptState(
                    "observation accepted without a session".to_string(),
                ))
            }
        };

        if self.start.observe(&session.game_id, obs.status) {
            self.dispatch_start(&session, obs);
            report.actions.push(Action::StartDispatched);
        }

        if !update.is_reset() {
            if let (Some(event_id), Some(draft)) = (&obs.event_id, &obs.event) {
                match self.schedule_identified(&session, obs, &update, event_id, draft.clone(), now) {
                    Ok(mut actions) => report.actions.append(&mut actions),
                    Err(e) if e.is_benign() => {
                        debug!("Skipping {} from {}: {}", event_id, obs.source.as_str(), e);
                        report.actions.push(Action::Skipped(e));
                    }
                    Err(e @ EngineError::CorruptState(_)) => {
                        error!("{}; resetting session", e);
                        self.reset(ResetReason::CorruptState);
                        return Err(e);
                    }
                    Err(e) => return Err(e),
                }
            }

            if update.score_increased() {
                if let Some(action) = self.schedule_fallback(&session, obs, &update, now) {
                    report.actions.push(action);
                }
            }
        }

        if obs.status.is_terminal() {
            let delay = dispatch_delay(Duration::ZERO, self.broadcast.current());
            if let Some(fire_at) = self.win.observe_terminal(
                &session,
                self.session.score(),
                self.config.win_requires_home,
                delay,
                now,
            ) {
                report.actions.push(Action::WinScheduled { fire_at });
            }
        }

        Ok(report)
    }

    fn schedule_identified(
        &mut self,
        session: &GameSession,
        obs: &Observation,
        update: &SessionUpdate,
        event_id: &str,
        draft: Draft,
        now: Instant,
    ) -> Result<Vec<Action>, EngineError> {
        let mut actions = Vec::new();
        match draft {
            Draft::Goal(mut goal) => {
                let signature = self
                    .scheduler
                    .pending(event_id)
                    .and_then(|p| p.draft.goal_score())
                    .or(goal.score)
                    .unwrap_or(update.current);
                let previous = if update.score_increased() {
                    update.previous
                } else {
                    self.fallback
                        .pending_for(&signature)
                        .map_or(update.previous, |p| p.prior)
                };
                goal.side = Some(resolve_goal_side(
                    &GoalEvidence {
                        team_tag: obs.explicit_team_tag.as_deref(),
                        tracked_flag: obs.tracked_flag,
                        previous,
                        current: signature,
                    },
                    session,
                ));
                goal.score = Some(signature);

                if !self.scheduler.is_pending(event_id) && self.goal_already_dispatched(&signature, now) {
                    self.scheduler.mark_fired(event_id);
                    return Err(EngineError::DuplicateEvent(format!(
                        "{} (score {} already dispatched)",
                        event_id, signature
                    )));
                }

                let delay = dispatch_delay(self.config.goal_coalesce, self.broadcast.current());
                match self.scheduler.schedule(event_id, Draft::Goal(goal), delay, now)? {
                    ScheduleOutcome::Scheduled { fire_at } => {
                        actions.push(Action::Scheduled {
                            event_id: event_id.to_string(),
                            kind: EventKind::Goal,
                            fire_at,
                        });
                        if self.fallback.cancel(&signature).is_some() {
                            info!(
                                "Goal {} from {} supersedes scoreboard fallback for {}",
                                event_id,
                                obs.source.as_str(),
                                signature
                            );
                            actions.push(Action::FallbackCancelled(signature));
                        }
                    }
                    ScheduleOutcome::Merged { fire_at } => actions.push(Action::Merged {
                        event_id: event_id.to_string(),
                        fire_at,
                    }),
                }
            }
            Draft::Penalty(penalty) => {
                let delay = dispatch_delay(self.config.penalty_coalesce, self.broadcast.current());
                match self.scheduler.schedule(event_id, Draft::Penalty(penalty), delay, now)? {
                    ScheduleOutcome::Scheduled { fire_at } => actions.push(Action::Scheduled {
                        event_id: event_id.to_string(),
                        kind: EventKind::Penalty,
                        fire_at,
                    }),
                    ScheduleOutcome::Merged { fire_at } => actions.push(Action::Merged {
                        event_id: event_id.to_string(),
                        fire_at,
                    }),
                }
            }
        }
        Ok(actions)
    }

    fn schedule_fallback(
        &mut self,
        session: &GameSession,
        obs: &Observation,
        update: &SessionUpdate,
        now: Instant,
    ) -> Option<Action> {
        let signature = update.current;
        if self.goal_already_dispatched(&signature, now) {
            debug!("Score {} already dispatched; no fallback", signature);
            return None;
        }
        if let Some(pending) = self.scheduler.pending_goal_for(&signature) {
            debug!("Goal {} pending for {}; no fallback", pending.event_id, signature);
            return None;
        }

        let side = resolve_goal_side(
            &GoalEvidence {
                team_tag: obs.explicit_team_tag.as_deref(),
                tracked_flag: obs.tracked_flag,
                previous: update.previous,
                current: signature,
            },
            session,
        );
        let delay = dispatch_delay(self.config.goal_coalesce, self.broadcast.current());
        let fire_at = self.fallback.on_score_delta(
            update.previous,
            signature,
            side,
            DeltaContext {
                period_ord: obs.period_ord.clone(),
                time_remaining: obs.time_remaining.clone(),
            },
            delay,
            now,
        )?;
        Some(Action::FallbackScheduled { signature, fire_at })
    }

    fn clear_session_state(&mut self, reason: ResetReason) {
        let cancelled = self.scheduler.reset() + self.fallback.reset();
        let win_cancelled = self.win.cancel_pending();
        self.suppression.clear();
        self.feeds.clear();
        self.stats.resets += 1;
        info!(
            "Session reset ({}): cancelled {} pending timers{}",
            reason.as_str(),
            cancelled,
            if win_cancelled { " and a pending win" } else { "" }
        );
    }

    fn dropped(&mut self, err: EngineError) -> EngineError {
        self.stats.dropped += 1;
        err
    }

    // ========================================================================
    // Timer firing
    // ========================================================================

    fn next_due(&self, now: Instant) -> Option<DueTimer> {
        [
            (self.scheduler.next_deadline(), DueTimer::Identified),
            (self.fallback.next_deadline(), DueTimer::Fallback),
            (self.win.next_deadline(), DueTimer::Win),
        ]
        .into_iter()
        .filter_map(|(deadline, which)| deadline.filter(|d| *d <= now).map(|d| (d, which)))
        .min_by_key(|(deadline, _)| *deadline)
        .map(|(_, which)| which)
    }

    fn fire_identified(&mut self, now: Instant) -> bool {
        match self.scheduler.fire_due(now, &self.feeds) {
            Ok(Some(event)) => self.dispatch_finalized(event, now),
            Ok(None) => false,
            Err(e @ EngineError::CorruptState(_)) => {
                error!("{}; resetting session", e);
                self.reset(ResetReason::CorruptState);
                false
            }
            Err(e) => {
                debug!("Timer fire skipped: {}", e);
                false
            }
        }
    }

    fn fire_fallback(&mut self, now: Instant) -> bool {
        match self.fallback.fire_due(now, &self.suppression) {
            Some(FallbackOutcome::Fire(pending)) => {
                if let Some(identified) = self.scheduler.pending_goal_for(&pending.signature) {
                    debug!(
                        "Dropping fallback for {}: goal {} still pending",
                        pending.signature, identified.event_id
                    );
                    return false;
                }
                self.dispatch_fallback(pending, now)
            }
            Some(FallbackOutcome::Suppressed(signature)) => {
                info!("Scoreboard fallback for {} suppressed as duplicate", signature);
                false
            }
            None => false,
        }
    }

    fn fire_win(&mut self, now: Instant) -> bool {
        let win = match self.win.fire_due(now) {
            Some(win) => win,
            None => return false,
        };
        let session = match self.session.session() {
            Some(s) if s.game_id == win.game_id => s.clone(),
            _ => {
                debug!("Win for game {} outlived its session", win.game_id);
                return false;
            }
        };
        let event = GameEvent::TeamWinEvent(WinRecord {
            header: self.header(&session, win.score),
        });
        self.emit(&event)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn dispatch_finalized(&mut self, event: FinalizedEvent, now: Instant) -> bool {
        let session = match self.session.session() {
            Some(s) => s.clone(),
            None => return false,
        };
        match event.draft {
            Draft::Goal(goal) => self.dispatch_goal(&session, Some(event.event_id), goal, DispatchPath::Coalesced, now),
            Draft::Penalty(penalty) => self.dispatch_penalty(&session, event.event_id, penalty),
        }
    }

    fn dispatch_goal(
        &mut self,
        session: &GameSession,
        event_id: Option<String>,
        goal: GoalDraft,
        path: DispatchPath,
        now: Instant,
    ) -> bool {
        let signature = goal.score.unwrap_or_else(|| self.session.score());
        if self.goal_already_dispatched(&signature, now) {
            info!(
                "Goal {} at {} already dispatched via another path",
                event_id.as_deref().unwrap_or("(no id)"),
                signature
            );
            return false;
        }
        self.suppression.raise(signature, self.config.suppress_window, now);
        self.scheduler.mark_signature_fired(&signature);
        self.fallback.cancel(&signature);

        let side = goal
            .side
            .unwrap_or_else(|| GoalSide::new(false, GoalSideBasis::Default));
        let record = GoalRecord {
            header: self.header(session, signature),
            event_id,
            scorer: goal.scorer.unwrap_or_else(|| UNKNOWN_SCORER.to_string()),
            assists: goal.assists,
            shot_type: goal.shot_type,
            strength: goal.strength,
            period_ord: goal.period_ord,
            time: goal.time,
            side_assumed: side.is_assumed(),
            path,
        };

        if side.tracked {
            self.emit(&GameEvent::GoalEvent(record))
        } else if self.config.emit_opponent_goals {
            self.emit(&GameEvent::OpponentGoalEvent(record))
        } else {
            debug!("Opponent goal at {} not emitted", signature);
            false
        }
    }

    fn dispatch_fallback(&mut self, pending: PendingFallback, now: Instant) -> bool {
        let session = match self.session.session() {
            Some(s) => s.clone(),
            None => return false,
        };
        let team = if pending.side.tracked {
            session.tracked_team().abbrev.clone()
        } else {
            session.opponent_team().abbrev.clone()
        };
        let score_str = pending.signature.score_str();

        let mut goal = match_goal_detail(
            self.feeds.scoring_feed(),
            &GoalQuery {
                team_abbr: Some(team.as_str()),
                score_str: Some(score_str.as_str()),
                ..Default::default()
            },
        )
        .unwrap_or_default();

        if !goal.has_scorer() {
            let parsed = self.feeds.last_play().and_then(parse_scorer_from_last_play);
            if let Some((name, tag)) = parsed {
                if tag.as_deref().map_or(true, |t| t.eq_ignore_ascii_case(&team)) {
                    goal.scorer = Some(name);
                }
            }
        }
        if goal.period_ord.is_none() {
            goal.period_ord = pending.period_ord.clone();
        }
        if goal.time.is_none() {
            goal.time = pending.time_remaining.clone();
        }
        goal.score = Some(pending.signature);
        goal.side = Some(pending.side);

        self.dispatch_goal(&session, None, goal, DispatchPath::Scoreboard, now)
    }

    fn dispatch_penalty(&mut self, session: &GameSession, event_id: String, penalty: PenaltyDraft) -> bool {
        let record = PenaltyRecord {
            header: self.header(session, self.session.score()),
            event_id,
            team_abbrev: penalty.team_abbrev,
            player: penalty.player.unwrap_or_else(|| UNKNOWN_SCORER.to_string()),
            infraction: penalty.infraction.unwrap_or_else(|| "Penalty".to_string()),
            minutes: penalty.minutes,
            drawn_by: penalty.drawn_by,
            served_by: penalty.served_by,
            result: penalty.result,
            period_ord: penalty.period_ord,
            time: penalty.time,
        };
        self.emit(&GameEvent::PenaltyEvent(record))
    }

    fn dispatch_start(&mut self, session: &GameSession, obs: &Observation) {
        let event = GameEvent::GameStartEvent(StartRecord {
            header: self.header(session, self.session.score()),
            time_remaining: obs.time_remaining.clone(),
        });
        self.emit(&event);
    }

    /// Suppressed, or dispatched earlier in this session after suppression lapsed
    fn goal_already_dispatched(&self, signature: &ScoreSignature, now: Instant) -> bool {
        self.suppression.is_suppressed(signature, now) || self.scheduler.signature_fired(signature)
    }

    fn header(&self, session: &GameSession, score: ScoreSignature) -> EventHeader {
        EventHeader {
            dispatch_id: Uuid::new_v4(),
            game_id: session.game_id.clone(),
            my_team: session.tracked_team().clone(),
            opp_team: session.opponent_team().clone(),
            my_score: session.my_score(&score),
            opp_score: session.opp_score(&score),
            is_home: session.is_home(),
            emitted_at: Utc::now(),
        }
    }

    fn emit(&mut self, event: &GameEvent) -> bool {
        self.stats.dispatched += 1;
        let delivered = self.emitter.emit(event);
        debug!(
            "Dispatched {} {} to {}/{} sinks",
            event.name(),
            event.header().dispatch_id,
            delivered,
            self.emitter.sink_count()
        );
        true
    }
}
