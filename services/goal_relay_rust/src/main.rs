//! Goal Relay Service
//!
//! Reconciles two live NHL feeds into one stream of game events.
//!
//! This service:
//! - Reads Feed A and Feed B observations as JSON lines on stdin
//! - Coalesces duplicate and partial reports of the same goal or penalty
//! - Falls back to scoreboard deltas when no feed identifies a goal
//! - Writes each dispatched event as a JSON line on stdout

use anyhow::Result;
use dotenv::dotenv;
use goal_relay_rust::{GoalRelay, RelayConfig};
use log::{info, warn};
use puckwatch_core::{EventEmitter, JsonLinesSink, LogSink};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    info!("Starting Goal Relay Service...");

    let config = RelayConfig::from_env()?;
    if config.engine.tracked_team.is_none() {
        warn!("TRACKED_TEAM not set; observations are dropped until a select_team line arrives");
    }
    info!(
        "Coalesce windows: goal={:?} penalty={:?} suppress={:?} broadcast_delay={:?}",
        config.engine.goal_coalesce,
        config.engine.penalty_coalesce,
        config.engine.suppress_window,
        config.engine.broadcast_delay
    );

    let emitter = EventEmitter::new()
        .with_sink(LogSink)
        .with_sink(JsonLinesSink::new(std::io::stdout()));

    let mut relay = GoalRelay::new(config, emitter);
    let stats = relay.run(BufReader::new(tokio::io::stdin())).await?;

    info!(
        "Goal Relay Service exiting: {}",
        serde_json::to_string(&stats)?
    );
    Ok(())
}
