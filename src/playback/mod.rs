//! Paced playback of an in-memory track
//!
//! This module provides:
//! - [`StreamConfig`] chunk size and tick settings
//! - Tick interval derivation from the track length
//! - [`Scheduler`] the looping read-and-broadcast task

pub mod config;
pub mod pacing;
pub mod scheduler;

pub use config::StreamConfig;
pub use pacing::{tick_interval, ChunkCursor, ChunkRead};
pub use scheduler::{PlaybackSummary, Scheduler, StopReason};
