//! Draft payloads for not-yet-dispatched events
//!
//! A draft accumulates detail from every observation that mentions the same
//! event id. Merging is a non-destructive overlay: a newer field replaces an
//! older one only when the newer field is actually present.

use super::ScoreSignature;
use crate::resolver::GoalSide;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Goal,
    Penalty,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Goal => "goal",
            EventKind::Penalty => "penalty",
        }
    }
}

/// Replace `slot` with `newer` when `newer` carries a value
fn overlay_field<T: Clone>(slot: &mut Option<T>, newer: &Option<T>) {
    if newer.is_some() {
        *slot = newer.clone();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalDraft {
    pub scorer: Option<String>,
    pub assists: Vec<String>,
    pub shot_type: Option<String>,
    pub strength: Option<String>,
    pub period_ord: Option<String>,
    pub time: Option<String>,
    pub score: Option<ScoreSignature>,
    pub team_abbrev: Option<String>,
    pub side: Option<GoalSide>,
}

impl GoalDraft {
    pub fn overlay(&mut self, newer: &GoalDraft) {
        overlay_field(&mut self.scorer, &newer.scorer);
        if !newer.assists.is_empty() {
            self.assists = newer.assists.clone();
        }
        overlay_field(&mut self.shot_type, &newer.shot_type);
        overlay_field(&mut self.strength, &newer.strength);
        overlay_field(&mut self.period_ord, &newer.period_ord);
        overlay_field(&mut self.time, &newer.time);
        // The score a goal was first seen at is its identity; later
        // snapshots may already include subsequent goals
        if self.score.is_none() {
            self.score = newer.score;
        }
        overlay_field(&mut self.team_abbrev, &newer.team_abbrev);

        // Attribution only moves toward stronger evidence
        self.side = match (self.side, newer.side) {
            (Some(current), Some(incoming)) => Some(current.stronger(incoming)),
            (current, incoming) => current.or(incoming),
        };
    }

    pub fn has_scorer(&self) -> bool {
        self.scorer.as_deref().map_or(false, |s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PenaltyDraft {
    pub team_abbrev: Option<String>,
    pub player: Option<String>,
    pub infraction: Option<String>,
    pub minutes: Option<u8>,
    pub drawn_by: Option<String>,
    pub served_by: Option<String>,
    pub result: Option<String>,
    pub period_ord: Option<String>,
    pub time: Option<String>,
}

impl PenaltyDraft {
    pub fn overlay(&mut self, newer: &PenaltyDraft) {
        overlay_field(&mut self.team_abbrev, &newer.team_abbrev);
        overlay_field(&mut self.player, &newer.player);
        overlay_field(&mut self.infraction, &newer.infraction);
        overlay_field(&mut self.minutes, &newer.minutes);
        overlay_field(&mut self.drawn_by, &newer.drawn_by);
        overlay_field(&mut self.served_by, &newer.served_by);
        overlay_field(&mut self.result, &newer.result);
        overlay_field(&mut self.period_ord, &newer.period_ord);
        overlay_field(&mut self.time, &newer.time);
    }
}

/// Tagged draft payload, one variant per event kind
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    Goal(GoalDraft),
    Penalty(PenaltyDraft),
}

impl Draft {
    pub fn kind(&self) -> EventKind {
        match self {
            Draft::Goal(_) => EventKind::Goal,
            Draft::Penalty(_) => EventKind::Penalty,
        }
    }

    /// Merge `newer` into this draft. Returns false (and leaves the draft
    /// untouched) when the kinds disagree.
    pub fn overlay(&mut self, newer: &Draft) -> bool {
        match (self, newer) {
            (Draft::Goal(current), Draft::Goal(incoming)) => {
                current.overlay(incoming);
                true
            }
            (Draft::Penalty(current), Draft::Penalty(incoming)) => {
                current.overlay(incoming);
                true
            }
            _ => false,
        }
    }

    pub fn goal_score(&self) -> Option<ScoreSignature> {
        match self {
            Draft::Goal(goal) => goal.score,
            Draft::Penalty(_) => None,
        }
    }
}
