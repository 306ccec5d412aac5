//! Listener and stream statistics

pub mod metrics;

pub use metrics::{ListenerStats, StreamStats};
