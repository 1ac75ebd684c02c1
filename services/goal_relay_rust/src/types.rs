//! Inbound line format and relay counters

use puckwatch_core::{FeedAUpdate, FeedBUpdate};
use serde::{Deserialize, Serialize};

/// One newline-delimited JSON record, tagged by `source`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Inbound {
    FeedA(FeedAUpdate),
    FeedB(FeedBUpdate),
    /// Manual team change
    SelectTeam { abbrev: String },
    /// Runtime broadcast delay adjustment
    BroadcastDelay { seconds: f64 },
}

impl Inbound {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub lines: u64,
    pub parse_errors: u64,
    pub engine_errors: u64,
    pub dispatched: u64,
}
