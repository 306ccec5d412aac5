//! Statistics for listeners and streams

use std::time::{Duration, Instant};

use crate::broadcast::RegistryStats;

/// Per-listener statistics kept by a pump
#[derive(Debug, Clone)]
pub struct ListenerStats {
    /// When the listener attached
    pub connected_at: Instant,
    /// Chunks written to the transport
    pub chunks_written: u64,
    /// Bytes written to the transport
    pub bytes_written: u64,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self {
            connected_at: Instant::now(),
            chunks_written: 0,
            bytes_written: 0,
        }
    }

    /// Account for one written chunk
    pub fn record_chunk(&mut self, len: usize) {
        self.chunks_written += 1;
        self.bytes_written += len as u64;
    }

    /// Time since the listener attached
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Average delivered bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_written * 8) / secs
        } else {
            0
        }
    }
}

impl Default for ListenerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream-level statistics reported by the station
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Id of the track being played
    pub track_id: u32,
    /// Title of the track being played
    pub title: String,
    /// When the stream started
    pub started_at: Instant,
    /// Tick period in use
    pub tick: Duration,
    /// Registry counters
    pub registry: RegistryStats,
}

impl StreamStats {
    /// Time since the stream started
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Share of per-listener handoffs that were dropped, 0.0 to 1.0
    pub fn drop_ratio(&self) -> f64 {
        let total = self.registry.delivered + self.registry.dropped;
        if total > 0 {
            self.registry.dropped as f64 / total as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_stats_new() {
        let stats = ListenerStats::new();
        assert_eq!(stats.chunks_written, 0);
        assert_eq!(stats.bytes_written, 0);
        assert_eq!(stats.bitrate(), 0);
    }

    #[test]
    fn test_listener_stats_record_chunk() {
        let mut stats = ListenerStats::new();
        stats.record_chunk(16384);
        stats.record_chunk(100);

        assert_eq!(stats.chunks_written, 2);
        assert_eq!(stats.bytes_written, 16484);
    }

    #[test]
    fn test_listener_stats_bitrate() {
        let mut stats = ListenerStats::new();
        stats.connected_at = Instant::now() - Duration::from_secs(10);
        stats.bytes_written = 1_000_000;

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.bitrate(), 800_000);
    }

    #[test]
    fn test_stream_stats_drop_ratio() {
        let mut stats = StreamStats {
            track_id: 1,
            title: "Hungarian Dance No.5".to_string(),
            started_at: Instant::now(),
            tick: Duration::from_millis(150),
            registry: RegistryStats::default(),
        };
        assert_eq!(stats.drop_ratio(), 0.0);

        stats.registry.delivered = 3;
        stats.registry.dropped = 1;
        assert!((stats.drop_ratio() - 0.25).abs() < f64::EPSILON);
    }
}
