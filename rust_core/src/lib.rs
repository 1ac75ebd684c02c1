//! Puckwatch Core - goal and penalty reconciliation across two live feeds.
//!
//! This crate provides:
//! - Normalization of two independent, partially-overlapping score feeds
//! - Session tracking with score baselines and reset on game change
//! - Goal side resolution (explicit tag, tracked flag, score delta, default)
//! - Coalescing of identified events with late-binding detail
//! - Scoreboard fallback for goals reported without an event id
//! - Cross-source suppression and at-most-once dispatch
//! - Game start and team win detection
//! - Event fan-out to pluggable sinks

pub mod coalesce;
pub mod config;
pub mod detail;
pub mod emitter;
pub mod error;
pub mod fallback;
pub mod fired_log;
pub mod lifecycle;
pub mod listener;
pub mod models;
pub mod observation;
pub mod resolver;
pub mod session;
pub mod suppression;
pub mod timer;

pub use config::{BroadcastDelay, EngineConfig, SharedDelay, StaticDelay};
pub use emitter::{EventEmitter, EventSink, JsonLinesSink, LogSink, RecordingSink, SinkError};
pub use error::EngineError;
pub use listener::{Action, DualSourceListener, EngineStats, ObservationReport};
pub use models::{FeedAUpdate, FeedBUpdate, GameEvent, ScoreSignature, TeamInfo};
pub use session::ResetReason;
