//! Game start and team win detection
//!
//! Both fire at most once per game id. Start is dispatched immediately; the
//! win waits out the broadcast delay on a plain one-shot timer since a final
//! score never needs merging.

use crate::models::{GameStatus, ScoreSignature};
use crate::session::GameSession;
use crate::timer::{TimerHandle, TimerQueue};
use log::{debug, info};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingWin {
    pub game_id: String,
    pub score: ScoreSignature,
    pub fire_at: Instant,
}

#[derive(Debug, Default)]
pub struct WinDetector {
    last_win_fired_game_id: Option<String>,
    pending: Option<(TimerHandle, PendingWin)>,
    timers: TimerQueue<()>,
}

impl WinDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a terminal observation and schedule the win when it qualifies
    pub fn observe_terminal(
        &mut self,
        session: &GameSession,
        score: ScoreSignature,
        requires_home: bool,
        delay: Duration,
        now: Instant,
    ) -> Option<Instant> {
        if self.last_win_fired_game_id.as_deref() == Some(session.game_id.as_str()) {
            return None;
        }
        if let Some((_, pending)) = &self.pending {
            if pending.game_id == session.game_id {
                return None;
            }
        }

        let (mine, theirs) = (session.my_score(&score), session.opp_score(&score));
        if mine <= theirs {
            debug!(
                "Game {} final {}-{}: no win for {}",
                session.game_id,
                mine,
                theirs,
                session.tracked_team().abbrev
            );
            return None;
        }
        if requires_home && !session.is_home() {
            debug!(
                "Game {} won on the road; win celebration requires home",
                session.game_id
            );
            return None;
        }

        self.cancel_pending();
        let fire_at = now + delay;
        let handle = self.timers.schedule(fire_at, ());
        info!(
            "Win for {} in game {} ({}-{}) scheduled in {:.1}s",
            session.tracked_team().abbrev,
            session.game_id,
            mine,
            theirs,
            delay.as_secs_f64()
        );
        self.pending = Some((
            handle,
            PendingWin {
                game_id: session.game_id.clone(),
                score,
                fire_at,
            },
        ));
        Some(fire_at)
    }

    pub fn fire_due(&mut self, now: Instant) -> Option<PendingWin> {
        let (handle, ()) = self.timers.pop_due(now)?;
        match self.pending.take() {
            Some((pending_handle, win)) if pending_handle == handle => {
                self.last_win_fired_game_id = Some(win.game_id.clone());
                Some(win)
            }
            other => {
                self.pending = other;
                None
            }
        }
    }

    pub fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some((handle, win)) => {
                self.timers.cancel(handle);
                debug!("Cancelled pending win for game {}", win.game_id);
                true
            }
            None => false,
        }
    }

    pub fn has_fired_for(&self, game_id: &str) -> bool {
        self.last_win_fired_game_id.as_deref() == Some(game_id)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }
}

/// Fires once per game id, when the game moves from a non-live state into a
/// live one. The first status seen for a game is only a baseline, so a game
/// already under way when observation starts never produces a start.
#[derive(Debug, Default)]
pub struct StartDetector {
    baseline: Option<(String, GameStatus)>,
    fired_game_id: Option<String>,
}

impl StartDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, game_id: &str, status: GameStatus) -> bool {
        let previous = match self.baseline.take() {
            Some((id, prev)) if id == game_id => Some(prev),
            _ => None,
        };
        self.baseline = Some((game_id.to_string(), status));

        let previous = match previous {
            Some(prev) => prev,
            None => {
                debug!("Game {} baseline status {:?}", game_id, status);
                return false;
            }
        };
        if !status.is_live() || previous.is_live() {
            return false;
        }
        if self.fired_game_id.as_deref() == Some(game_id) {
            return false;
        }
        self.fired_game_id = Some(game_id.to_string());
        true
    }
}
