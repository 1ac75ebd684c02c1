//! Goal relay service library
//!
//! Wraps the puckwatch reconciliation engine in a single-task tokio loop fed
//! by newline-delimited JSON on stdin.

pub mod config;
pub mod relay;
pub mod types;

pub use config::RelayConfig;
pub use relay::GoalRelay;
pub use types::{Inbound, RelayStats};
