//! End-to-end tests for the relay loop
//!
//! Time is paused, so the runtime jumps straight to each timer deadline and
//! elapsed durations are exact.

use goal_relay_rust::{GoalRelay, RelayConfig};
use puckwatch_core::models::DispatchPath;
use puckwatch_core::{EngineConfig, EventEmitter, GameEvent, RecordingSink};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
use tokio::time::{self, Instant};

const PRE_0_0: &str = r#"{"source":"feed_a","game_id":"g1","state":"PRE","home":{"abbrev":"TOR","name":"Toronto Maple Leafs"},"away":{"abbrev":"BOS","name":"Boston Bruins"},"home_score":0,"away_score":0}"#;
const LIVE_0_0: &str = r#"{"source":"feed_a","game_id":"g1","state":"LIVE","home":{"abbrev":"TOR","name":"Toronto Maple Leafs"},"away":{"abbrev":"BOS","name":"Boston Bruins"},"home_score":0,"away_score":0,"period_ord":"1st","time_remaining":"20:00"}"#;
const LIVE_1_1: &str = r#"{"source":"feed_a","game_id":"g1","state":"LIVE","home":{"abbrev":"TOR","name":"Toronto Maple Leafs"},"away":{"abbrev":"BOS","name":"Boston Bruins"},"home_score":1,"away_score":1,"period_ord":"2nd","time_remaining":"10:00"}"#;
const FEED_A_2_1: &str = r#"{"source":"feed_a","game_id":"g1","state":"LIVE","home":{"abbrev":"TOR","name":"Toronto Maple Leafs"},"away":{"abbrev":"BOS","name":"Boston Bruins"},"home_score":2,"away_score":1,"period_ord":"2nd","time_remaining":"08:15"}"#;
const FEED_B_GOAL_2_1: &str = r#"{"source":"feed_b","game_id":"g1","state":"LIVE","home":{"abbrev":"TOR","name":"Toronto Maple Leafs"},"away":{"abbrev":"BOS","name":"Boston Bruins"},"home_score":2,"away_score":1,"goal_event_id":55,"goal_team_abbrev":"TOR","scorer_name":"Auston Matthews","period":"2nd","goal_time":"08:15"}"#;

fn relay() -> (GoalRelay, RecordingSink) {
    let recording = RecordingSink::new();
    let config = RelayConfig {
        engine: EngineConfig::default().with_tracked_team("TOR"),
        heartbeat_interval: Duration::from_secs(30),
    };
    let relay = GoalRelay::new(config, EventEmitter::new().with_sink(recording.clone()));
    (relay, recording)
}

/// Feed `lines` into a pipe, pausing before each one, then close it
fn feed(lines: Vec<(u64, &'static str)>) -> BufReader<DuplexStream> {
    let (mut writer, reader) = tokio::io::duplex(16 * 1024);
    tokio::spawn(async move {
        for (pause_ms, line) in lines {
            time::sleep(Duration::from_millis(pause_ms)).await;
            writer.write_all(line.as_bytes()).await.unwrap();
            writer.write_all(b"\n").await.unwrap();
        }
    });
    BufReader::new(reader)
}

#[tokio::test(start_paused = true)]
async fn test_cross_source_goal_relayed_once() {
    let (mut relay, recording) = relay();
    let reader = feed(vec![
        (0, LIVE_1_1),
        (100, FEED_A_2_1),
        (300, FEED_B_GOAL_2_1),
        // Feed A repeats the same score after the goal is out
        (2_000, FEED_A_2_1),
    ]);

    let stats = relay.run(reader).await.unwrap();

    assert_eq!(stats.lines, 4);
    assert_eq!(stats.parse_errors, 0);
    assert_eq!(stats.dispatched, 1);
    // Already live on the first line: no puck-drop event
    assert_eq!(recording.names(), vec!["goal_event"]);

    match &recording.events()[0] {
        GameEvent::GoalEvent(goal) => {
            assert_eq!(goal.event_id.as_deref(), Some("55"));
            assert_eq!(goal.scorer, "Auston Matthews");
            assert_eq!(goal.path, DispatchPath::Coalesced);
        }
        other => panic!("expected goal_event, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_delay_line_shifts_dispatch() {
    let (mut relay, recording) = relay();
    let reader = feed(vec![
        (0, r#"{"source":"broadcast_delay","seconds":10}"#),
        (0, LIVE_1_1),
        (0, FEED_A_2_1),
    ]);

    let started = Instant::now();
    let stats = relay.run(reader).await.unwrap();
    let elapsed = started.elapsed();

    // Scoreboard-only goal: goal window plus broadcast delay
    assert!(elapsed >= Duration::from_millis(11_300), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(12), "elapsed {:?}", elapsed);
    assert_eq!(stats.dispatched, 1);

    let events = recording.events();
    match events.last() {
        Some(GameEvent::GoalEvent(goal)) => {
            assert_eq!(goal.path, DispatchPath::Scoreboard);
            assert!(goal.event_id.is_none());
        }
        other => panic!("expected goal_event, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_malformed_lines_are_counted_and_skipped() {
    let (mut relay, recording) = relay();
    let reader = feed(vec![
        (0, "not json at all"),
        (0, r#"{"source":"feed_c","game_id":"g1"}"#),
        (0, ""),
        (0, PRE_0_0),
        (0, r#"{"source":"feed_b","state":"LIVE","home_score":0,"away_score":0}"#),
        (0, LIVE_0_0),
    ]);

    let stats = relay.run(reader).await.unwrap();

    assert_eq!(stats.lines, 5);
    assert_eq!(stats.parse_errors, 2);
    assert_eq!(stats.engine_errors, 1);
    assert_eq!(stats.dispatched, 0);
    assert_eq!(recording.names(), vec!["game_start_event"]);
}

#[tokio::test(start_paused = true)]
async fn test_eof_drains_pending_timers() {
    let (mut relay, recording) = relay();
    let reader = feed(vec![(0, LIVE_1_1), (0, FEED_B_GOAL_2_1)]);

    let started = Instant::now();
    relay.run(reader).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(1_300));
    assert_eq!(relay.engine().pending_events(), 0);
    assert_eq!(recording.names(), vec!["goal_event"]);
}
