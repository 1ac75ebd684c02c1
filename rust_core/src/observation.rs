//! Feed normalization
//!
//! Both inbound feeds are folded into one `Observation` shape, built once per
//! update and discarded after processing. The latest raw update from each
//! feed is also kept (`LiveFeeds`) so pending events can re-read detail at
//! fire time.

use crate::coalesce::SnapshotSource;
use crate::detail::{
    cleanup_player_display, match_goal_detail, match_penalty_detail, GoalQuery, PenaltyQuery,
};
use crate::error::EngineError;
use crate::models::{
    Draft, EventKind, FeedAEvent, FeedAUpdate, FeedBUpdate, GameStatus, GoalDraft, PenaltyDraft,
    ScoreSignature, ScoringEntry, Source, TeamInfo,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub source: Source,
    pub game_id: String,
    pub status: GameStatus,
    pub home: TeamInfo,
    pub away: TeamInfo,
    pub score: ScoreSignature,
    /// Identifier of the event described by `event`
    pub event_id: Option<String>,
    pub event: Option<Draft>,
    pub explicit_team_tag: Option<String>,
    pub tracked_flag: Option<bool>,
    pub period_ord: Option<String>,
    pub time_remaining: Option<String>,
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            source: Source::FeedA,
            game_id: String::new(),
            status: GameStatus::Unknown,
            home: TeamInfo::default(),
            away: TeamInfo::default(),
            score: ScoreSignature::default(),
            event_id: None,
            event: None,
            explicit_team_tag: None,
            tracked_flag: None,
            period_ord: None,
            time_remaining: None,
        }
    }
}

fn require_game_id(game_id: &Option<String>, source: Source) -> Result<String, EngineError> {
    game_id
        .clone()
        .ok_or_else(|| EngineError::SourceDataGap(format!("{} update without game_id", source.as_str())))
}

/// Events are only acted on once the game is under way
fn accepts_events(status: GameStatus) -> bool {
    status.is_live() || status.is_terminal()
}

fn cleaned(value: Option<&str>) -> Option<String> {
    value
        .map(cleanup_player_display)
        .filter(|v| !v.is_empty())
}

fn upper(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_uppercase())
        .filter(|v| !v.is_empty())
}

fn cleaned_all(names: &[String]) -> Vec<String> {
    names.iter().filter_map(|n| cleaned(Some(n.as_str()))).collect()
}

/// Draft for Feed A's last play, if it is a goal or a penalty
pub fn feed_a_draft(event: &FeedAEvent, score: ScoreSignature) -> Option<Draft> {
    match event.kind.trim().to_lowercase().as_str() {
        "goal" => Some(Draft::Goal(GoalDraft {
            scorer: cleaned(event.scorer.as_deref()),
            assists: cleaned_all(&event.assists),
            shot_type: event.shot_type.clone(),
            strength: event.strength.clone(),
            period_ord: event.period_ord.clone(),
            time: event.time_in_period.clone(),
            score: Some(score),
            team_abbrev: upper(event.team.as_deref()),
            side: None,
        })),
        "penalty" => Some(Draft::Penalty(PenaltyDraft {
            team_abbrev: upper(event.team.as_deref()),
            player: cleaned(event.committed_by.as_deref()),
            infraction: cleaned(event.penalty_name.as_deref()),
            minutes: event.minutes,
            drawn_by: cleaned(event.drawn_by.as_deref()),
            served_by: None,
            result: None,
            period_ord: event.period_ord.clone(),
            time: event.time_in_period.clone(),
        })),
        _ => None,
    }
}

/// Goal draft from Feed B's goal fields
pub fn feed_b_draft(update: &FeedBUpdate) -> GoalDraft {
    GoalDraft {
        scorer: cleaned(update.scorer_name.as_deref()),
        assists: cleaned_all(&update.assist_names),
        shot_type: update.shot_type.clone(),
        strength: update.strength.clone(),
        period_ord: update.period.clone(),
        time: update.goal_time.clone(),
        score: Some(ScoreSignature::new(update.home_score, update.away_score)),
        team_abbrev: upper(update.goal_team_abbrev.as_deref()),
        side: None,
    }
}

impl Observation {
    pub fn from_feed_a(update: &FeedAUpdate) -> Result<Self, EngineError> {
        let game_id = require_game_id(&update.game_id, Source::FeedA)?;
        let status = GameStatus::parse(&update.state);
        let score = ScoreSignature::new(update.home_score, update.away_score);

        let (event_id, event, explicit_team_tag) = match (&update.last_event, &update.last_event_id) {
            (Some(last), Some(id)) if accepts_events(status) => match feed_a_draft(last, score) {
                Some(draft) => (Some(id.clone()), Some(draft), upper(last.team.as_deref())),
                None => (None, None, None),
            },
            _ => (None, None, None),
        };

        Ok(Self {
            source: Source::FeedA,
            game_id,
            status,
            home: update.home.clone(),
            away: update.away.clone(),
            score,
            event_id,
            event,
            explicit_team_tag,
            tracked_flag: None,
            period_ord: update.period_ord.clone(),
            time_remaining: update.time_remaining.clone(),
        })
    }

    pub fn from_feed_b(update: &FeedBUpdate) -> Result<Self, EngineError> {
        let game_id = require_game_id(&update.game_id, Source::FeedB)?;
        let status = GameStatus::parse(&update.state);

        let (event_id, event) = match &update.goal_event_id {
            Some(id) if accepts_events(status) => {
                (Some(id.clone()), Some(Draft::Goal(feed_b_draft(update))))
            }
            _ => (None, None),
        };

        Ok(Self {
            source: Source::FeedB,
            game_id,
            status,
            home: update.home.clone(),
            away: update.away.clone(),
            score: ScoreSignature::new(update.home_score, update.away_score),
            event_id,
            event,
            explicit_team_tag: upper(update.goal_team_abbrev.as_deref()),
            tracked_flag: update.goal_tracked_team,
            period_ord: update.period.clone(),
            time_remaining: update.time_remaining.clone(),
        })
    }

    pub fn event_kind(&self) -> Option<EventKind> {
        self.event.as_ref().map(Draft::kind)
    }
}

/// Latest raw update from each feed for the current session
#[derive(Debug, Clone, Default)]
pub struct LiveFeeds {
    pub feed_a: Option<FeedAUpdate>,
    pub feed_b: Option<FeedBUpdate>,
}

impl LiveFeeds {
    pub fn scoring_feed(&self) -> &[ScoringEntry] {
        self.feed_a
            .as_ref()
            .map(|a| a.scoring_detail.as_slice())
            .unwrap_or(&[])
    }

    pub fn last_play(&self) -> Option<&str> {
        self.feed_a.as_ref().and_then(|a| a.last_play.as_deref())
    }

    pub fn clear(&mut self) {
        self.feed_a = None;
        self.feed_b = None;
    }

    fn feed_a_event(&self, event_id: &str) -> Option<Draft> {
        let update = self.feed_a.as_ref()?;
        if update.last_event_id.as_deref() != Some(event_id) {
            return None;
        }
        let score = ScoreSignature::new(update.home_score, update.away_score);
        update.last_event.as_ref().and_then(|e| feed_a_draft(e, score))
    }

    fn feed_b_goal(&self, event_id: &str) -> Option<GoalDraft> {
        let update = self.feed_b.as_ref()?;
        if update.goal_event_id.as_deref() != Some(event_id) {
            return None;
        }
        Some(feed_b_draft(update))
    }

    fn goal_detail(&self, event_id: &str, pending: &GoalDraft) -> Option<GoalDraft> {
        let score_str = pending.score.map(|s| s.score_str());
        let matched = match_goal_detail(
            self.scoring_feed(),
            &GoalQuery {
                team_abbr: pending.team_abbrev.as_deref(),
                score_str: score_str.as_deref(),
                scorer: None,
                time: None,
            },
        );

        let mut found = matched.is_some();
        let mut detail = matched.unwrap_or_default();
        if let Some(Draft::Goal(goal)) = self.feed_a_event(event_id) {
            detail.overlay(&goal);
            found = true;
        }
        if let Some(goal) = self.feed_b_goal(event_id) {
            detail.overlay(&goal);
            found = true;
        }
        // Score was fixed when the goal was first seen; later snapshots may
        // already show subsequent goals
        detail.score = None;
        found.then_some(detail)
    }

    fn penalty_detail(&self, event_id: &str, pending: &PenaltyDraft) -> Option<PenaltyDraft> {
        let penalties = self
            .feed_a
            .as_ref()
            .map(|a| a.penalty_detail.as_slice())
            .unwrap_or(&[]);
        let matched = match_penalty_detail(
            penalties,
            &PenaltyQuery {
                team_abbr: pending.team_abbrev.as_deref(),
                infraction: pending.infraction.as_deref(),
                player: pending.player.as_deref(),
                time: pending.time.as_deref(),
                period_ord: pending.period_ord.as_deref(),
            },
        );

        let mut found = matched.is_some();
        let mut detail = matched.unwrap_or_default();
        if let Some(Draft::Penalty(penalty)) = self.feed_a_event(event_id) {
            detail.overlay(&penalty);
            found = true;
        }
        found.then_some(detail)
    }
}

impl SnapshotSource for LiveFeeds {
    fn latest_detail(&self, event_id: &str, pending: &Draft) -> Option<Draft> {
        match pending {
            Draft::Goal(goal) => self.goal_detail(event_id, goal).map(Draft::Goal),
            Draft::Penalty(penalty) => self.penalty_detail(event_id, penalty).map(Draft::Penalty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PenaltyEntry;

    fn feed_a(state: &str, kind: &str) -> FeedAUpdate {
        FeedAUpdate {
            game_id: Some("g1".to_string()),
            state: state.to_string(),
            home: TeamInfo::new("TOR", "Toronto Maple Leafs"),
            away: TeamInfo::new("BOS", "Boston Bruins"),
            home_score: 1,
            away_score: 0,
            last_event: Some(FeedAEvent {
                kind: kind.to_string(),
                team: Some("tor".to_string()),
                scorer: Some("Auston Matthews #34".to_string()),
                assists: vec!["Mitch Marner".to_string()],
                committed_by: Some("Morgan Rielly".to_string()),
                penalty_name: Some("Hooking".to_string()),
                minutes: Some(2),
                time_in_period: Some("05:00".to_string()),
                period_ord: Some("1st".to_string()),
                ..Default::default()
            }),
            last_event_id: Some("101".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_feed_a_goal_observation() {
        let obs = Observation::from_feed_a(&feed_a("LIVE", "goal")).unwrap();
        assert_eq!(obs.event_id.as_deref(), Some("101"));
        assert_eq!(obs.explicit_team_tag.as_deref(), Some("TOR"));
        match obs.event {
            Some(Draft::Goal(goal)) => {
                assert_eq!(goal.scorer.as_deref(), Some("Auston Matthews"));
                assert_eq!(goal.score, Some(ScoreSignature::new(1, 0)));
            }
            other => panic!("expected goal draft, got {:?}", other),
        }
    }

    #[test]
    fn test_feed_a_penalty_and_other_plays() {
        let obs = Observation::from_feed_a(&feed_a("LIVE", "penalty")).unwrap();
        assert_eq!(obs.event_kind(), Some(EventKind::Penalty));

        let obs = Observation::from_feed_a(&feed_a("LIVE", "faceoff")).unwrap();
        assert!(obs.event.is_none());
        assert!(obs.event_id.is_none());
    }

    #[test]
    fn test_pregame_events_ignored() {
        let obs = Observation::from_feed_a(&feed_a("PRE", "goal")).unwrap();
        assert!(obs.event.is_none());
        assert_eq!(obs.status, GameStatus::Pregame);
    }

    #[test]
    fn test_missing_game_id_is_data_gap() {
        let mut update = feed_a("LIVE", "goal");
        update.game_id = None;
        let err = Observation::from_feed_a(&update).unwrap_err();
        assert_eq!(err.kind(), "source_data_gap");
    }

    #[test]
    fn test_feed_b_observation() {
        let update = FeedBUpdate {
            game_id: Some("g1".to_string()),
            state: "LIVE".to_string(),
            home_score: 2,
            away_score: 1,
            goal_event_id: Some("55".to_string()),
            goal_team_abbrev: Some("TOR".to_string()),
            goal_tracked_team: Some(true),
            scorer_name: Some("William Nylander".to_string()),
            ..Default::default()
        };
        let obs = Observation::from_feed_b(&update).unwrap();
        assert_eq!(obs.source, Source::FeedB);
        assert_eq!(obs.event_id.as_deref(), Some("55"));
        assert_eq!(obs.tracked_flag, Some(true));
        assert_eq!(obs.event.and_then(|d| d.goal_score()), Some(ScoreSignature::new(2, 1)));
    }

    #[test]
    fn test_live_feeds_late_detail() {
        let mut update = feed_a("LIVE", "goal");
        update.scoring_detail = vec![ScoringEntry {
            team_abbr: Some("TOR".to_string()),
            score_str: Some("1-0".to_string()),
            scorer: Some("Auston Matthews".to_string()),
            shot_type: Some("Snap".to_string()),
            ..Default::default()
        }];
        let feeds = LiveFeeds {
            feed_a: Some(update),
            feed_b: None,
        };

        let pending = Draft::Goal(GoalDraft {
            team_abbrev: Some("TOR".to_string()),
            score: Some(ScoreSignature::new(1, 0)),
            ..Default::default()
        });
        match feeds.latest_detail("101", &pending) {
            Some(Draft::Goal(goal)) => {
                assert_eq!(goal.shot_type.as_deref(), Some("Snap"));
                assert_eq!(goal.assists, vec!["Mitch Marner".to_string()]);
                assert!(goal.score.is_none());
            }
            other => panic!("expected goal detail, got {:?}", other),
        }

        // Unknown id with no matching summary row
        let pending = Draft::Goal(GoalDraft {
            score: Some(ScoreSignature::new(5, 5)),
            ..Default::default()
        });
        assert!(feeds.latest_detail("999", &pending).is_none());
    }

    #[test]
    fn test_live_feeds_penalty_detail() {
        let mut update = feed_a("LIVE", "faceoff");
        update.penalty_detail = vec![PenaltyEntry {
            team_abbr: Some("BOS".to_string()),
            name: Some("Tripping".to_string()),
            player: Some("Brad Marchand".to_string()),
            served_by: Some("David Pastrnak".to_string()),
            ..Default::default()
        }];
        let feeds = LiveFeeds {
            feed_a: Some(update),
            feed_b: None,
        };
        let pending = Draft::Penalty(PenaltyDraft {
            team_abbrev: Some("BOS".to_string()),
            player: Some("Brad Marchand".to_string()),
            ..Default::default()
        });
        match feeds.latest_detail("7", &pending) {
            Some(Draft::Penalty(p)) => assert_eq!(p.served_by.as_deref(), Some("David Pastrnak")),
            other => panic!("expected penalty detail, got {:?}", other),
        }
    }
}
