//! Engine tuning and the broadcast-delay seam
//!
//! Goal and penalty windows are independent. The broadcast delay is an extra
//! offset applied on top of every window; it can be fixed at start-up or
//! adjusted while the engine runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default goal coalescing window in seconds
pub const DEFAULT_GOAL_COALESCE_SECS: f64 = 1.3;

/// Default penalty coalescing window in seconds
pub const DEFAULT_PENALTY_COALESCE_SECS: f64 = 2.0;

/// Default suppression window in seconds
pub const DEFAULT_SUPPRESS_SECS: f64 = 5.0;

/// Upper bound for any broadcast delay in seconds
pub const MAX_BROADCAST_DELAY_SECS: f64 = 120.0;

/// Floor for every scheduled dispatch
pub const MIN_TIMER_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Abbreviation of the tracked team; `None` disables tracking
    pub tracked_team: Option<String>,
    pub goal_coalesce: Duration,
    pub penalty_coalesce: Duration,
    pub suppress_window: Duration,
    /// Static broadcast delay, used unless a dynamic source is attached
    pub broadcast_delay: Duration,
    /// Only celebrate wins when the tracked team is at home
    pub win_requires_home: bool,
    pub emit_opponent_goals: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracked_team: None,
            goal_coalesce: secs_to_duration(DEFAULT_GOAL_COALESCE_SECS),
            penalty_coalesce: secs_to_duration(DEFAULT_PENALTY_COALESCE_SECS),
            suppress_window: secs_to_duration(DEFAULT_SUPPRESS_SECS),
            broadcast_delay: Duration::ZERO,
            win_requires_home: true,
            emit_opponent_goals: true,
        }
    }
}

impl EngineConfig {
    pub fn with_tracked_team(mut self, abbrev: &str) -> Self {
        self.tracked_team = Some(abbrev.trim().to_uppercase());
        self
    }
}

/// Fractional seconds to a duration, rounded to the millisecond
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::from_millis((secs.max(0.0) * 1000.0).round() as u64)
}

/// Clamp a raw seconds value into `[0, MAX_BROADCAST_DELAY_SECS]`
pub fn clamp_broadcast_delay(secs: f64) -> Duration {
    if !secs.is_finite() {
        return Duration::ZERO;
    }
    secs_to_duration(secs.clamp(0.0, MAX_BROADCAST_DELAY_SECS))
}

/// Total delay for a scheduled dispatch, never below `MIN_TIMER_DELAY`
pub fn dispatch_delay(window: Duration, broadcast: Duration) -> Duration {
    (window + broadcast).max(MIN_TIMER_DELAY)
}

/// Source of the current broadcast delay
pub trait BroadcastDelay: Send + Sync {
    fn current(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct StaticDelay(Duration);

impl StaticDelay {
    pub fn new(delay: Duration) -> Self {
        Self(clamp_broadcast_delay(delay.as_secs_f64()))
    }
}

impl BroadcastDelay for StaticDelay {
    fn current(&self) -> Duration {
        self.0
    }
}

/// Broadcast delay that can be changed while the engine runs
#[derive(Debug, Clone, Default)]
pub struct SharedDelay {
    millis: Arc<AtomicU64>,
}

impl SharedDelay {
    pub fn new(initial: Duration) -> Self {
        let shared = Self::default();
        shared.set_secs(initial.as_secs_f64());
        shared
    }

    pub fn set_secs(&self, secs: f64) {
        let clamped = clamp_broadcast_delay(secs);
        self.millis.store(clamped.as_millis() as u64, Ordering::Relaxed);
    }
}

impl BroadcastDelay for SharedDelay {
    fn current(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.goal_coalesce, Duration::from_millis(1300));
        assert_eq!(config.penalty_coalesce, Duration::from_secs(2));
        assert_eq!(config.suppress_window, Duration::from_secs(5));
        assert!(config.win_requires_home);
        assert!(config.tracked_team.is_none());
    }

    #[test]
    fn test_clamp_broadcast_delay() {
        assert_eq!(clamp_broadcast_delay(-3.0), Duration::ZERO);
        assert_eq!(clamp_broadcast_delay(500.0), Duration::from_secs(120));
        assert_eq!(clamp_broadcast_delay(f64::NAN), Duration::ZERO);
        assert_eq!(clamp_broadcast_delay(7.5), Duration::from_millis(7500));
    }

    #[test]
    fn test_dispatch_delay_floor() {
        assert_eq!(dispatch_delay(Duration::ZERO, Duration::ZERO), MIN_TIMER_DELAY);
        assert_eq!(
            dispatch_delay(Duration::from_secs(1), Duration::from_secs(10)),
            Duration::from_secs(11)
        );
    }

    #[test]
    fn test_shared_delay_updates_all_clones() {
        let delay = SharedDelay::new(Duration::from_secs(3));
        let reader = delay.clone();
        assert_eq!(reader.current(), Duration::from_secs(3));

        delay.set_secs(200.0);
        assert_eq!(reader.current(), Duration::from_secs(120));
    }
}
