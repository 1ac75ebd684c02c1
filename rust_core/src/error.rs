//! Error taxonomy for the reconciliation engine
//!
//! None of these are fatal. Every variant is contained to the observation or
//! timer firing that produced it; the listener logs it and moves on.

use crate::models::ScoreSignature;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A required setting is absent, so the feature it gates is disabled.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// The tracked team is not playing in the observed game.
    #[error("tracked team {tracked} not in game ({home} vs {away})")]
    UnresolvableTeam {
        tracked: String,
        home: String,
        away: String,
    },

    /// Goal side could not be determined; a default was assumed.
    #[error("goal side undetermined at {signature}; assumed opponent")]
    AmbiguousGoalSide { signature: ScoreSignature },

    /// The event id (or score signature) was already dispatched or is already pending.
    #[error("duplicate event {0}")]
    DuplicateEvent(String),

    /// The feed omitted a field the engine needs to act on the observation.
    #[error("source data gap: {0}")]
    SourceDataGap(String),

    /// A timer was cancelled after it had already fired or been removed.
    #[error("timer for {0} not pending")]
    TimerCancelRace(String),

    /// Internal bookkeeping disagreed with itself; answered with a session reset.
    #[error("corrupt engine state: {0}")]
    CorruptState(String),
}

impl EngineError {
    /// Stable category label for logs and counters
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::MissingConfig(_) => "missing_config",
            EngineError::UnresolvableTeam { .. } => "unresolvable_team",
            EngineError::AmbiguousGoalSide { .. } => "ambiguous_goal_side",
            EngineError::DuplicateEvent(_) => "duplicate_event",
            EngineError::SourceDataGap(_) => "source_data_gap",
            EngineError::TimerCancelRace(_) => "timer_cancel_race",
            EngineError::CorruptState(_) => "corrupt_state",
        }
    }

    /// Errors that are routine outcomes rather than something worth a warning
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateEvent(_)
                | EngineError::TimerCancelRace(_)
                | EngineError::AmbiguousGoalSide { .. }
        )
    }
}
