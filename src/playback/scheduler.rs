//! Paced playback loop
//!
//! A [`Scheduler`] slices one immutable payload into chunks and broadcasts one
//! chunk per tick, restarting from the top whenever the payload runs out.
//! It runs until its cancellation token fires or, with an idle timeout set,
//! until nobody has listened for that long. Either way it closes its registry
//! on the way out so every pump sees end of stream.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::broadcast::BroadcastRegistry;
use crate::error::StreamError;

use super::config::StreamConfig;
use super::pacing::{tick_interval, ChunkCursor, ChunkRead};

/// Why a scheduler stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Cancellation token fired
    Cancelled,
    /// No listeners for longer than the idle timeout
    Idle,
}

/// What a finished scheduler did
#[derive(Debug, Clone)]
pub struct PlaybackSummary {
    /// Passes started over the payload
    pub passes: u64,
    /// Chunks handed to the registry
    pub chunks: u64,
    /// Payload bytes handed to the registry
    pub bytes: u64,
    /// Wall time between start and stop
    pub elapsed: Duration,
    /// Why it stopped
    pub reason: StopReason,
}

/// Drives one stream: reads the payload at a fixed cadence and broadcasts it
pub struct Scheduler {
    registry: Arc<BroadcastRegistry>,
    payload: Bytes,
    track_length: f64,
    config: StreamConfig,
}

impl Scheduler {
    /// Prepare a scheduler for `payload`.
    ///
    /// `track_length` is the estimated play length in seconds; 0 means
    /// unknown. An empty payload is refused since every pass would end on its
    /// first tick.
    pub fn new(
        registry: Arc<BroadcastRegistry>,
        payload: Bytes,
        track_length: f64,
        config: StreamConfig,
    ) -> Result<Self, StreamError> {
        if payload.is_empty() {
            return Err(StreamError::EmptyPayload);
        }
        if config.chunk_size == 0 {
            return Err(StreamError::ZeroChunkSize);
        }
        if config.fallback_tick.is_zero() {
            return Err(StreamError::ZeroTick);
        }

        Ok(Self {
            registry,
            payload,
            track_length,
            config,
        })
    }

    /// Registry this scheduler broadcasts into
    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    /// Tick period used for each pass
    pub fn tick_interval(&self) -> Duration {
        tick_interval(self.track_length, self.payload.len(), &self.config)
    }

    /// Run on a background task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<PlaybackSummary> {
        tokio::spawn(self.run(cancel))
    }

    /// Run until cancelled or idle
    pub async fn run(self, cancel: CancellationToken) -> PlaybackSummary {
        let started = Instant::now();
        let mut cursor = ChunkCursor::new(self.payload.clone(), self.config.chunk_size);
        let mut idle_since = None;
        let mut passes = 0u64;
        let mut chunks = 0u64;
        let mut bytes = 0u64;

        tracing::info!(
            payload_bytes = self.payload.len(),
            track_length = self.track_length,
            tick_ms = self.tick_interval().as_millis() as u64,
            "Stream started"
        );

        let reason = 'stream: loop {
            cursor.rewind();
            passes += 1;

            let period = self.tick_interval();
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::debug!(pass = passes, "Starting pass over payload");

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'stream StopReason::Cancelled,
                    _ = ticker.tick() => {}
                }

                if self.idle_expired(&mut idle_since).await {
                    break 'stream StopReason::Idle;
                }

                match cursor.next_chunk() {
                    ChunkRead::Chunk { chunk, last } => {
                        self.registry.broadcast(&chunk).await;
                        chunks += 1;
                        bytes += chunk.len() as u64;
                        if last {
                            break;
                        }
                    }
                    ChunkRead::End => break,
                }
            }
        };

        self.registry.close().await;

        let summary = PlaybackSummary {
            passes,
            chunks,
            bytes,
            elapsed: started.elapsed(),
            reason,
        };

        tracing::info!(
            reason = ?summary.reason,
            passes = summary.passes,
            chunks = summary.chunks,
            "Stream stopped"
        );

        summary
    }

    async fn idle_expired(&self, idle_since: &mut Option<Instant>) -> bool {
        let Some(timeout) = self.config.idle_timeout else {
            return false;
        };

        if self.registry.listener_count().await > 0 {
            *idle_since = None;
            return false;
        }

        let since = *idle_since.get_or_insert_with(Instant::now);
        since.elapsed() >= timeout
    }
}
