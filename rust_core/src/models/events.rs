//! Outbound domain events
//!
//! Every record is self-describing (teams, score, period/time) because
//! dispatch order follows each event's own delay, not observation order.

use super::TeamInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields common to every outbound record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHeader {
    pub dispatch_id: Uuid,
    pub game_id: String,
    pub my_team: TeamInfo,
    pub opp_team: TeamInfo,
    pub my_score: u16,
    pub opp_score: u16,
    pub is_home: bool,
    pub emitted_at: DateTime<Utc>,
}

/// Which engine path produced a goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPath {
    /// Identified event, coalesced by event id
    Coalesced,
    /// Inferred from a score increase with no event id
    Scoreboard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRecord {
    #[serde(flatten)]
    pub header: EventHeader,
    pub event_id: Option<String>,
    pub scorer: String,
    pub assists: Vec<String>,
    pub shot_type: Option<String>,
    pub strength: Option<String>,
    pub period_ord: Option<String>,
    pub time: Option<String>,
    /// True when the goal side came from the resolver's fallback default
    pub side_assumed: bool,
    pub path: DispatchPath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyRecord {
    #[serde(flatten)]
    pub header: EventHeader,
    pub event_id: String,
    pub team_abbrev: Option<String>,
    pub player: String,
    pub infraction: String,
    pub minutes: Option<u8>,
    pub drawn_by: Option<String>,
    pub served_by: Option<String>,
    pub result: Option<String>,
    pub period_ord: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinRecord {
    #[serde(flatten)]
    pub header: EventHeader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRecord {
    #[serde(flatten)]
    pub header: EventHeader,
    pub time_remaining: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GoalEvent(GoalRecord),
    OpponentGoalEvent(GoalRecord),
    PenaltyEvent(PenaltyRecord),
    TeamWinEvent(WinRecord),
    GameStartEvent(StartRecord),
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::GoalEvent(_) => "goal_event",
            GameEvent::OpponentGoalEvent(_) => "opponent_goal_event",
            GameEvent::PenaltyEvent(_) => "penalty_event",
            GameEvent::TeamWinEvent(_) => "team_win_event",
            GameEvent::GameStartEvent(_) => "game_start_event",
        }
    }

    pub fn header(&self) -> &EventHeader {
        match self {
            GameEvent::GoalEvent(r) | GameEvent::OpponentGoalEvent(r) => &r.header,
            GameEvent::PenaltyEvent(r) => &r.header,
            GameEvent::TeamWinEvent(r) => &r.header,
            GameEvent::GameStartEvent(r) => &r.header,
        }
    }

    pub fn as_goal(&self) -> Option<&GoalRecord> {
        match self {
            GameEvent::GoalEvent(r) | GameEvent::OpponentGoalEvent(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> EventHeader {
        EventHeader {
            dispatch_id: Uuid::new_v4(),
            game_id: "g1".to_string(),
            my_team: TeamInfo::new("TOR", "Toronto Maple Leafs"),
            opp_team: TeamInfo::new("BOS", "Boston Bruins"),
            my_score: 3,
            opp_score: 2,
            is_home: true,
            emitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_serializes_flat_with_type_tag() {
        let event = GameEvent::TeamWinEvent(WinRecord { header: header() });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "team_win_event");
        assert_eq!(json["game_id"], "g1");
        assert_eq!(json["my_score"], 3);
        assert_eq!(json["my_team"]["abbrev"], "TOR");
        assert_eq!(event.name(), "team_win_event");
    }

    #[test]
    fn test_goal_accessor() {
        let record = GoalRecord {
            header: header(),
            event_id: Some("55".to_string()),
            scorer: "Auston Matthews".to_string(),
            assists: vec![],
            shot_type: None,
            strength: None,
            period_ord: Some("2nd".to_string()),
            time: Some("10:00".to_string()),
            side_assumed: false,
            path: DispatchPath::Coalesced,
        };
        let event = GameEvent::OpponentGoalEvent(record);
        assert_eq!(event.as_goal().map(|g| g.scorer.as_str()), Some("Auston Matthews"));
        assert_eq!(event.header().game_id, "g1");
        assert!(GameEvent::TeamWinEvent(WinRecord { header: header() }).as_goal().is_none());
    }
}
