//! Goal side resolution
//!
//! Decides whether a goal belongs to the tracked team or the opponent.
//! First match wins:
//! 1. explicit team tag on the observation
//! 2. explicit "is tracked team" flag
//! 3. score delta against the previous baseline
//! 4. default to opponent, flagged as assumed

use crate::error::EngineError;
use crate::models::ScoreSignature;
use crate::session::GameSession;
use log::warn;
use serde::{Deserialize, Serialize};

/// How a goal side was decided, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalSideBasis {
    Default,
    ScoreDelta,
    TrackedFlag,
    ExplicitTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalSide {
    /// True when the tracked team scored
    pub tracked: bool,
    pub basis: GoalSideBasis,
}

impl GoalSide {
    pub fn new(tracked: bool, basis: GoalSideBasis) -> Self {
        Self { tracked, basis }
    }

    /// Low-confidence result from the fallback default
    pub fn is_assumed(&self) -> bool {
        self.basis == GoalSideBasis::Default
    }

    /// Pick whichever attribution rests on stronger evidence (ties keep self)
    pub fn stronger(self, other: GoalSide) -> GoalSide {
        if other.basis > self.basis {
            other
        } else {
            self
        }
    }
}

/// Signals available for attributing one goal
#[derive(Debug, Clone, Copy)]
pub struct GoalEvidence<'a> {
    pub team_tag: Option<&'a str>,
    pub tracked_flag: Option<bool>,
    pub previous: ScoreSignature,
    pub current: ScoreSignature,
}

/// Resolve which side scored. Pure apart from the warning logged when the
/// result is an assumption.
pub fn resolve_goal_side(evidence: &GoalEvidence<'_>, session: &GameSession) -> GoalSide {
    if let Some(tag) = evidence.team_tag {
        if session.tracked_team().matches_abbrev(tag) {
            return GoalSide::new(true, GoalSideBasis::ExplicitTag);
        }
        if session.opponent_team().matches_abbrev(tag) {
            return GoalSide::new(false, GoalSideBasis::ExplicitTag);
        }
    }

    if let Some(flag) = evidence.tracked_flag {
        return GoalSide::new(flag, GoalSideBasis::TrackedFlag);
    }

    let tracked = session.tracked_side;
    let opponent = tracked.opposite();
    let tracked_up =
        evidence.current.score_for(tracked) > evidence.previous.score_for(tracked);
    let opponent_up =
        evidence.current.score_for(opponent) > evidence.previous.score_for(opponent);

    match (tracked_up, opponent_up) {
        (true, false) => GoalSide::new(true, GoalSideBasis::ScoreDelta),
        (false, true) => GoalSide::new(false, GoalSideBasis::ScoreDelta),
        _ => {
            let err = EngineError::AmbiguousGoalSide {
                signature: evidence.current,
            };
            warn!("{} (game {})", err, session.game_id);
            GoalSide::new(false, GoalSideBasis::Default)
        }
    }
}
