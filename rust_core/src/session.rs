//! Tracked-game session and score baseline
//!
//! A session is created for the first observed game id and torn down on any
//! game id change, any score decrease, or a manual team change. A reset
//! rebaselines on the triggering observation's score so that a process
//! started mid-game never manufactures goals for score already on the board.

use crate::error::EngineError;
use crate::models::{ScoreSignature, Side, Source, TeamInfo};
use crate::observation::Observation;
use log::{debug, info};
use std::collections::HashMap;

/// Identity of the tracked game
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    pub game_id: String,
    pub tracked_side: Side,
    pub home: TeamInfo,
    pub away: TeamInfo,
}

impl GameSession {
    /// Build a session, locating the tracked team on either side
    pub fn resolve(
        game_id: &str,
        home: &TeamInfo,
        away: &TeamInfo,
        tracked_abbrev: &str,
    ) -> Result<Self, EngineError> {
        let tracked_side = if home.matches_abbrev(tracked_abbrev) {
            Side::Home
        } else if away.matches_abbrev(tracked_abbrev) {
            Side::Away
        } else {
            return Err(EngineError::UnresolvableTeam {
                tracked: tracked_abbrev.to_string(),
                home: home.abbrev.clone(),
                away: away.abbrev.clone(),
            });
        };

        Ok(Self {
            game_id: game_id.to_string(),
            tracked_side,
            home: home.clone(),
            away: away.clone(),
        })
    }

    pub fn is_home(&self) -> bool {
        self.tracked_side == Side::Home
    }

    pub fn team(&self, side: Side) -> &TeamInfo {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn tracked_team(&self) -> &TeamInfo {
        self.team(self.tracked_side)
    }

    pub fn opponent_team(&self) -> &TeamInfo {
        self.team(self.tracked_side.opposite())
    }

    pub fn my_score(&self, score: &ScoreSignature) -> u16 {
        score.score_for(self.tracked_side)
    }

    pub fn opp_score(&self, score: &ScoreSignature) -> u16 {
        score.score_for(self.tracked_side.opposite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    NewGame,
    ScoreDecrease,
    TeamChange,
    CorruptState,
}

impl ResetReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetReason::NewGame => "new_game",
            ResetReason::ScoreDecrease => "score_decrease",
            ResetReason::TeamChange => "team_change",
            ResetReason::CorruptState => "corrupt_state",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Unchanged,
    Reset(ResetReason),
}

/// Result of folding one observation into the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUpdate {
    pub change: SessionChange,
    /// Merged score before this observation
    pub previous: ScoreSignature,
    /// Merged score after this observation
    pub current: ScoreSignature,
}

impl SessionUpdate {
    pub fn is_reset(&self) -> bool {
        matches!(self.change, SessionChange::Reset(_))
    }

    /// True when the merged score went up
    pub fn score_increased(&self) -> bool {
        !self.is_reset() && self.current != self.previous
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    session: Option<GameSession>,
    score: ScoreSignature,
    /// Last score reported by each feed; a decrease is judged per feed so a
    /// lagging feed is not mistaken for a reset
    last_by_source: HashMap<Source, ScoreSignature>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn score(&self) -> ScoreSignature {
        self.score
    }

    /// Fold an observation into the session, resetting when required
    pub fn observe(
        &mut self,
        obs: &Observation,
        tracked_abbrev: &str,
    ) -> Result<SessionUpdate, EngineError> {
        let same_game = self
            .session
            .as_ref()
            .map_or(false, |s| s.game_id == obs.game_id);

        if !same_game {
            // Resolve before touching state: an unrelated game is dropped,
            // not allowed to tear down the current one
            let session = GameSession::resolve(&obs.game_id, &obs.home, &obs.away, tracked_abbrev)?;
            info!(
                "New session for game {}: {} vs {} (tracking {}), baseline {}",
                session.game_id,
                session.home.abbrev,
                session.away.abbrev,
                session.tracked_team().abbrev,
                obs.score
            );
            self.rebaseline(session, obs);
            return Ok(self.reset_update(ResetReason::NewGame));
        }

        let decreased = self
            .last_by_source
            .get(&obs.source)
            .map_or(false, |prev| obs.score.decreased_from(prev));
        if decreased {
            info!(
                "Score decreased on {} for game {} ({} -> {}); resetting session",
                obs.source.as_str(),
                obs.game_id,
                self.last_by_source.get(&obs.source).copied().unwrap_or_default(),
                obs.score
            );
            let session = GameSession::resolve(&obs.game_id, &obs.home, &obs.away, tracked_abbrev)?;
            self.rebaseline(session, obs);
            return Ok(self.reset_update(ResetReason::ScoreDecrease));
        }

        self.last_by_source.insert(obs.source, obs.score);
        let previous = self.score;
        self.score = self.score.componentwise_max(&obs.score);
        if self.score != previous {
            debug!("Score {} -> {} via {}", previous, self.score, obs.source.as_str());
        }

        Ok(SessionUpdate {
            change: SessionChange::Unchanged,
            previous,
            current: self.score,
        })
    }

    /// Drop the session entirely; the next observation starts a new one
    pub fn clear(&mut self) {
        self.session = None;
        self.score = ScoreSignature::default();
        self.last_by_source.clear();
    }

    fn rebaseline(&mut self, session: GameSession, obs: &Observation) {
        self.session = Some(session);
        self.score = obs.score;
        self.last_by_source.clear();
        self.last_by_source.insert(obs.source, obs.score);
    }

    fn reset_update(&self, reason: ResetReason) -> SessionUpdate {
        SessionUpdate {
            change: SessionChange::Reset(reason),
            previous: self.score,
            current: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameStatus;

    fn obs(source: Source, game_id: &str, home: u16, away: u16) -> Observation {
        Observation {
            source,
            game_id: game_id.to_string(),
            status: GameStatus::Live,
            home: TeamInfo::new("TOR", "Toronto Maple Leafs"),
            away: TeamInfo::new("BOS", "Boston Bruins"),
            score: ScoreSignature::new(home, away),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_observation_baselines_on_its_score() {
        let mut state = SessionState::new();
        let update = state.observe(&obs(Source::FeedA, "g1", 2, 1), "BOS").unwrap();

        assert_eq!(update.change, SessionChange::Reset(ResetReason::NewGame));
        assert_eq!(update.current, ScoreSignature::new(2, 1));
        assert!(!update.score_increased());

        let session = state.session().unwrap();
        assert_eq!(session.tracked_side, Side::Away);
        assert_eq!(session.my_score(&update.current), 1);
        assert_eq!(session.opp_score(&update.current), 2);
    }

    #[test]
    fn test_increase_and_lagging_source() {
        let mut state = SessionState::new();
        state.observe(&obs(Source::FeedA, "g1", 0, 0), "TOR").unwrap();

        let update = state.observe(&obs(Source::FeedB, "g1", 1, 0), "TOR").unwrap();
        assert!(update.score_increased());
        assert_eq!(update.previous, ScoreSignature::new(0, 0));

        // Feed A still at 0-0: behind, but not a decrease of its own report
        let update = state.observe(&obs(Source::FeedA, "g1", 0, 0), "TOR").unwrap();
        assert_eq!(update.change, SessionChange::Unchanged);
        assert_eq!(update.current, ScoreSignature::new(1, 0));
    }

    #[test]
    fn test_decrease_forces_reset() {
        let mut state = SessionState::new();
        state.observe(&obs(Source::FeedA, "g1", 3, 2), "TOR").unwrap();

        let update = state.observe(&obs(Source::FeedA, "g1", 0, 0), "TOR").unwrap();
        assert_eq!(update.change, SessionChange::Reset(ResetReason::ScoreDecrease));
        assert_eq!(state.score(), ScoreSignature::new(0, 0));
    }

    #[test]
    fn test_new_game_id_resets() {
        let mut state = SessionState::new();
        state.observe(&obs(Source::FeedA, "g1", 3, 2), "TOR").unwrap();

        let update = state.observe(&obs(Source::FeedB, "g2", 1, 0), "TOR").unwrap();
        assert_eq!(update.change, SessionChange::Reset(ResetReason::NewGame));
        assert_eq!(state.score(), ScoreSignature::new(1, 0));
        assert_eq!(state.session().unwrap().game_id, "g2");
    }

    #[test]
    fn test_unresolvable_team_keeps_current_session() {
        let mut state = SessionState::new();
        state.observe(&obs(Source::FeedA, "g1", 1, 1), "TOR").unwrap();

        let mut other = obs(Source::FeedA, "g9", 0, 0);
        other.home = TeamInfo::new("MTL", "Montreal Canadiens");
        other.away = TeamInfo::new("OTT", "Ottawa Senators");
        let err = state.observe(&other, "TOR").unwrap_err();

        assert_eq!(err.kind(), "unresolvable_team");
        assert_eq!(state.session().unwrap().game_id, "g1");
        assert_eq!(state.score(), ScoreSignature::new(1, 1));
    }

    #[test]
    fn test_clear() {
        let mut state = SessionState::new();
        state.observe(&obs(Source::FeedA, "g1", 1, 1), "TOR").unwrap();
        state.clear();
        assert!(state.session().is_none());
        assert_eq!(state.score(), ScoreSignature::default());
    }
}
