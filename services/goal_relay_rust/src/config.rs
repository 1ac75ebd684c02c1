//! Environment loading for the goal relay
//!
//! Every engine knob has a default matching the engine's own defaults. A
//! value that is present but malformed is a startup error, never ignored.

use anyhow::{anyhow, Context, Result};
use puckwatch_core::config::{
    clamp_broadcast_delay, secs_to_duration, DEFAULT_GOAL_COALESCE_SECS, DEFAULT_PENALTY_COALESCE_SECS,
    DEFAULT_SUPPRESS_SECS,
};
use puckwatch_core::EngineConfig;
use std::env;
use std::time::Duration;

/// Default heartbeat interval in seconds
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub engine: EngineConfig,
    pub heartbeat_interval: Duration,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tracked_team = lookup("TRACKED_TEAM")
            .map(|v| v.trim().to_uppercase())
            .filter(|v| !v.is_empty());

        let goal_coalesce = parse_secs(&lookup, "GOAL_COALESCE_SECS", DEFAULT_GOAL_COALESCE_SECS)?;
        let penalty_coalesce =
            parse_secs(&lookup, "PENALTY_COALESCE_SECS", DEFAULT_PENALTY_COALESCE_SECS)?;
        let suppress_window = parse_secs(&lookup, "SUPPRESS_SECS", DEFAULT_SUPPRESS_SECS)?;

        let broadcast_raw = parse_f64(&lookup, "BROADCAST_DELAY_SECS", 0.0)?;
        let broadcast_delay = clamp_broadcast_delay(broadcast_raw);

        let win_requires_home = parse_bool(&lookup, "WIN_REQUIRES_HOME", true)?;
        let emit_opponent_goals = parse_bool(&lookup, "EMIT_OPPONENT_GOALS", true)?;

        let heartbeat_interval = Duration::from_secs(
            parse_f64(
                &lookup,
                "HEARTBEAT_INTERVAL_SECS",
                DEFAULT_HEARTBEAT_INTERVAL_SECS as f64,
            )?
            .max(1.0) as u64,
        );

        Ok(Self {
            engine: EngineConfig {
                tracked_team,
                goal_coalesce,
                penalty_coalesce,
                suppress_window,
                broadcast_delay,
                win_requires_home,
                emit_opponent_goals,
            },
            heartbeat_interval,
        })
    }
}

fn parse_f64<F>(lookup: &F, key: &str, default: f64) -> Result<f64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid {key}: {raw} (expected seconds)"))?;
            if !value.is_finite() {
                return Err(anyhow!("Invalid {key}: {raw} (expected a finite number)"));
            }
            Ok(value)
        }
    }
}

/// Non-negative duration in (fractional) seconds
fn parse_secs<F>(lookup: &F, key: &str, default: f64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_f64(lookup, key, default)?;
    if value < 0.0 {
        return Err(anyhow!("Invalid {key}: {value} (must not be negative)"));
    }
    Ok(secs_to_duration(value))
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(default),
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        other => Err(anyhow!("Invalid {key}: {other} (expected true|false)")),
    }
}
