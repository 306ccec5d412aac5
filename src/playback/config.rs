//! Stream configuration

use std::time::Duration;

/// Bytes handed to listeners per tick
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Tick period used when the track length is unknown
pub const DEFAULT_FALLBACK_TICK: Duration = Duration::from_millis(150);

/// Multiplier applied to the per-chunk share of the track length
pub const DEFAULT_PACING_UNIT: Duration = Duration::from_secs(1);

/// How long a stream may run with nobody listening
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Playback scheduler configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Size of each chunk sliced from the payload
    pub chunk_size: usize,

    /// Tick period when the track length is unknown or zero
    pub fallback_tick: Duration,

    /// Tick period for a known track length is
    /// `pacing_unit * track_length * chunk_size / payload_len`
    pub pacing_unit: Duration,

    /// Stop the stream after this long without listeners (None = never)
    pub idle_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            fallback_tick: DEFAULT_FALLBACK_TICK,
            pacing_unit: DEFAULT_PACING_UNIT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }
}

impl StreamConfig {
    /// Set the chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the fallback tick period
    pub fn fallback_tick(mut self, tick: Duration) -> Self {
        self.fallback_tick = tick;
        self
    }

    /// Set the pacing unit
    pub fn pacing_unit(mut self, unit: Duration) -> Self {
        self.pacing_unit = unit;
        self
    }

    /// Set the idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Keep streaming with no listeners until cancelled
    pub fn keep_alive(mut self) -> Self {
        self.idle_timeout = None;
        self
    }
}
