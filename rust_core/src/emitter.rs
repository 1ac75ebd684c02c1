//! Outbound dispatch to external collaborators
//!
//! The emitter holds no engine state. It fans each finalized event out to
//! every registered sink; a failing sink is logged and never blocks the rest.

use crate::models::GameEvent;
use log::{info, warn};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait EventSink: Send {
    fn name(&self) -> &str;
    fn emit(&self, event: &GameEvent) -> Result<(), SinkError>;
}

/// Writes a one-line summary of every event to the log
pub struct LogSink;

fn minutes_label(minutes: Option<u8>) -> String {
    minutes.map_or_else(|| "?".to_string(), |m| m.to_string())
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn emit(&self, event: &GameEvent) -> Result<(), SinkError> {
        let header = event.header();
        match event {
            GameEvent::GoalEvent(goal) | GameEvent::OpponentGoalEvent(goal) => info!(
                "{} game={} {} {}-{} {} scorer={} assists=[{}]{}",
                event.name(),
                header.game_id,
                header.my_team.abbrev,
                header.my_score,
                header.opp_score,
                header.opp_team.abbrev,
                goal.scorer,
                goal.assists.join(", "),
                if goal.side_assumed { " (side assumed)" } else { "" }
            ),
            GameEvent::PenaltyEvent(penalty) => info!(
                "{} game={} {} {} ({} min)",
                event.name(),
                header.game_id,
                penalty.player,
                penalty.infraction,
                minutes_label(penalty.minutes)
            ),
            _ => info!(
                "{} game={} {} {}-{} {}",
                event.name(),
                header.game_id,
                header.my_team.abbrev,
                header.my_score,
                header.opp_score,
                header.opp_team.abbrev
            ),
        }
        Ok(())
    }
}

/// Serializes each event as one JSON line
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn name(&self) -> &str {
        "json_lines"
    }

    fn emit(&self, event: &GameEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps every event in memory; clones share the same buffer
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.events.lock().clone()
    }

    /// Event type names in dispatch order
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(GameEvent::name).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn emit(&self, event: &GameEvent) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct EventEmitter {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn add_sink(&mut self, sink: impl EventSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Hand the event to every sink; returns how many accepted it
    pub fn emit(&self, event: &GameEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.emit(event) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Sink {} failed to emit {} ({}): {}",
                    sink.name(),
                    event.name(),
                    event.header().dispatch_id,
                    e
                ),
            }
        }
        delivered
    }
}
