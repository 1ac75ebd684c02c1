//! GoalRelay: the single event loop that owns the engine
//!
//! One task, three wake-up sources:
//! - the engine's next timer deadline
//! - the next inbound line
//! - a periodic heartbeat
//!
//! Everything runs serially, so the engine needs no locking. On EOF the relay
//! keeps firing timers until none are left, then returns.

use crate::config::RelayConfig;
use crate::types::{Inbound, RelayStats};
use anyhow::Result;
use log::{debug, error, info, warn};
use puckwatch_core::{BroadcastDelay, DualSourceListener, EngineError, EventEmitter, SharedDelay};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{self, Instant, MissedTickBehavior};

pub struct GoalRelay {
    engine: DualSourceListener,
    delay: SharedDelay,
    heartbeat_interval: Duration,
    stats: RelayStats,
}

impl GoalRelay {
    pub fn new(config: RelayConfig, emitter: EventEmitter) -> Self {
        let delay = SharedDelay::new(config.engine.broadcast_delay);
        let engine = DualSourceListener::new(config.engine, emitter)
            .with_broadcast_delay(Arc::new(delay.clone()));

        Self {
            engine,
            delay,
            heartbeat_interval: config.heartbeat_interval,
            stats: RelayStats::default(),
        }
    }

    pub fn engine(&self) -> &DualSourceListener {
        &self.engine
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Process one inbound line
    pub fn handle_line(&mut self, line: &str, now: Instant) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.stats.lines += 1;

        let inbound = match Inbound::parse(line) {
            Ok(inbound) => inbound,
            Err(e) => {
                self.stats.parse_errors += 1;
                warn!("Skipping unparseable line: {}", e);
                return;
            }
        };

        let result = match inbound {
            Inbound::FeedA(update) => self.engine.observe_feed_a(update, now).map(|_| ()),
            Inbound::FeedB(update) => self.engine.observe_feed_b(update, now).map(|_| ()),
            Inbound::SelectTeam { abbrev } => {
                if !self.engine.select_team(&abbrev) {
                    debug!("Team selection unchanged ({})", abbrev);
                }
                Ok(())
            }
            Inbound::BroadcastDelay { seconds } => {
                self.delay.set_secs(seconds);
                info!(
                    "Broadcast delay set to {:.1}s",
                    self.delay.current().as_secs_f64()
                );
                Ok(())
            }
        };

        if let Err(e) = result {
            self.stats.engine_errors += 1;
            log_engine_error(&e);
        }
    }

    /// Fire whatever is due at `now`
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let dispatched = self.engine.fire_due(now);
        self.stats.dispatched += dispatched as u64;
        dispatched
    }

    /// Drive the engine from `reader` until input closes and all timers drain
    pub async fn run<R>(&mut self, reader: R) -> Result<RelayStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut heartbeat = time::interval(self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut input_open = true;

        info!(
            "Goal relay running (tracking {})",
            self.engine.tracked_team().unwrap_or("no team")
        );

        loop {
            let deadline = self.engine.next_deadline();
            if !input_open && deadline.is_none() {
                break;
            }

            tokio::select! {
                biased;

                _ = wait_until(deadline) => {
                    self.fire_due(Instant::now());
                }

                line = lines.next_line(), if input_open => match line {
                    Ok(Some(line)) => self.handle_line(&line, Instant::now()),
                    Ok(None) => {
                        input_open = false;
                        info!(
                            "Input closed; draining {} pending events and {} fallbacks",
                            self.engine.pending_events(),
                            self.engine.pending_fallbacks()
                        );
                    }
                    Err(e) => {
                        input_open = false;
                        error!("Input read error, draining and stopping: {}", e);
                    }
                },

                _ = heartbeat.tick() => self.log_heartbeat(),
            }
        }

        info!(
            "Goal relay stopped: {} lines, {} dispatched, {} parse errors, {} engine errors",
            self.stats.lines, self.stats.dispatched, self.stats.parse_errors, self.stats.engine_errors
        );
        Ok(self.stats)
    }

    fn log_heartbeat(&self) {
        let engine = self.engine.stats();
        let score = self.engine.score();
        info!(
            "Heartbeat: game={} score={} pending={} fallbacks={} observations={} dispatched={} resets={}",
            self.engine
                .session()
                .map(|s| s.game_id.as_str())
                .unwrap_or("-"),
            score,
            self.engine.pending_events(),
            self.engine.pending_fallbacks(),
            engine.observations,
            engine.dispatched,
            engine.resets
        );
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn log_engine_error(err: &EngineError) {
    match err {
        EngineError::MissingConfig(_) => debug!("Observation dropped: {}", err),
        e if e.is_benign() => debug!("{}", e),
        e => warn!("Observation dropped ({}): {}", e.kind(), e),
    }
}
