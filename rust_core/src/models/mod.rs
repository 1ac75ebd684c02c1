// Shared models for the puckwatch engine and relay service
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub mod draft;
pub mod events;

pub use draft::{Draft, EventKind, GoalDraft, PenaltyDraft};
pub use events::{
    DispatchPath, EventHeader, GameEvent, GoalRecord, PenaltyRecord, StartRecord, WinRecord,
};

// ============================================================================
// Sides, Scores & Game Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

/// (home_score, away_score) - the dedup key for goals without an event id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScoreSignature {
    pub home: u16,
    pub away: u16,
}

impl ScoreSignature {
    pub fn new(home: u16, away: u16) -> Self {
        Self { home, away }
    }

    pub fn score_for(&self, side: Side) -> u16 {
        match side {
            Side::Home => self.home,
            Side::Away => self.away,
        }
    }

    /// True if either counter went down relative to `earlier`
    pub fn decreased_from(&self, earlier: &ScoreSignature) -> bool {
        self.home < earlier.home || self.away < earlier.away
    }

    /// Componentwise maximum of two signatures
    pub fn componentwise_max(&self, other: &ScoreSignature) -> ScoreSignature {
        ScoreSignature::new(self.home.max(other.home), self.away.max(other.away))
    }

    /// "H-A" form used by scoring feeds
    pub fn score_str(&self) -> String {
        format!("{}-{}", self.home, self.away)
    }
}

impl fmt::Display for ScoreSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.home, self.away)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Pregame,
    Live,
    Critical,
    Final,
    Off,
    Unknown,
}

impl GameStatus {
    pub fn parse(raw: &str) -> GameStatus {
        match raw.trim().to_uppercase().as_str() {
            "FUT" | "PRE" | "PREGAME" | "SCHEDULED" => GameStatus::Pregame,
            "LIVE" | "IN_PROGRESS" => GameStatus::Live,
            "CRIT" => GameStatus::Critical,
            "FINAL" => GameStatus::Final,
            "OFF" => GameStatus::Off,
            _ => GameStatus::Unknown,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, GameStatus::Live | GameStatus::Critical)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Final | GameStatus::Off)
    }
}

// ============================================================================
// Team Identity
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub abbrev: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

impl TeamInfo {
    pub fn new(abbrev: &str, name: &str) -> Self {
        Self {
            abbrev: abbrev.to_uppercase(),
            name: Some(name.to_string()),
            logo: None,
        }
    }

    pub fn matches_abbrev(&self, abbrev: &str) -> bool {
        !abbrev.trim().is_empty() && self.abbrev.trim().eq_ignore_ascii_case(abbrev.trim())
    }

    /// Full name when known, abbreviation otherwise
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.abbrev)
    }
}

// ============================================================================
// Inbound Feed Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Derived scoreboard + play feed
    FeedA,
    /// Upstream league API bridge
    FeedB,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::FeedA => "feed_a",
            Source::FeedB => "feed_b",
        }
    }
}

/// Feed A: derived scoreboard with a last-play summary and detail lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedAUpdate {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub game_id: Option<String>,
    pub state: String,
    #[serde(default)]
    pub home: TeamInfo,
    #[serde(default)]
    pub away: TeamInfo,
    #[serde(default)]
    pub home_score: u16,
    #[serde(default)]
    pub away_score: u16,
    #[serde(default)]
    pub last_event: Option<FeedAEvent>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub last_event_id: Option<String>,
    #[serde(default)]
    pub scoring_detail: Vec<ScoringEntry>,
    #[serde(default)]
    pub penalty_detail: Vec<PenaltyEntry>,
    #[serde(default)]
    pub period_ord: Option<String>,
    #[serde(default)]
    pub time_remaining: Option<String>,
    #[serde(default)]
    pub last_play: Option<String>,
}

/// Most recent play reported by Feed A
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedAEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub scorer: Option<String>,
    #[serde(default)]
    pub assists: Vec<String>,
    #[serde(default)]
    pub shot_type: Option<String>,
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default)]
    pub time_in_period: Option<String>,
    #[serde(default)]
    pub period_ord: Option<String>,
    #[serde(default)]
    pub penalty_name: Option<String>,
    #[serde(default)]
    pub committed_by: Option<String>,
    #[serde(default)]
    pub drawn_by: Option<String>,
    #[serde(default)]
    pub minutes: Option<u8>,
}

/// One row of a play-by-play scoring summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringEntry {
    #[serde(default)]
    pub team_abbr: Option<String>,
    #[serde(default)]
    pub score_str: Option<String>,
    #[serde(default)]
    pub scorer: Option<String>,
    #[serde(default)]
    pub assists: Vec<String>,
    #[serde(default)]
    pub shot_type: Option<String>,
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub period_ord: Option<String>,
}

/// One row of a play-by-play penalty summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PenaltyEntry {
    #[serde(default)]
    pub team_abbr: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default)]
    pub minutes: Option<u8>,
    #[serde(default)]
    pub drawn_by: Option<String>,
    #[serde(default)]
    pub served_by: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub period_ord: Option<String>,
}

/// Feed B: league API bridge, goal-centric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedBUpdate {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub game_id: Option<String>,
    pub state: String,
    #[serde(default)]
    pub home: TeamInfo,
    #[serde(default)]
    pub away: TeamInfo,
    #[serde(default)]
    pub home_score: u16,
    #[serde(default)]
    pub away_score: u16,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub goal_event_id: Option<String>,
    #[serde(default)]
    pub goal_team_abbrev: Option<String>,
    #[serde(default)]
    pub goal_tracked_team: Option<bool>,
    #[serde(default)]
    pub scorer_name: Option<String>,
    #[serde(default)]
    pub assist_names: Vec<String>,
    #[serde(default)]
    pub shot_type: Option<String>,
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default)]
    pub time_remaining: Option<String>,
    #[serde(default)]
    pub goal_time: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
}

/// Feeds send ids as either strings or bare integers; blanks mean "absent"
fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
