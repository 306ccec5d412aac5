//! Tick pacing and payload slicing

use std::time::Duration;

use bytes::Bytes;

use super::config::StreamConfig;

/// Shortest tick the scheduler will use
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Compute the tick period for one pass over the payload.
///
/// With a known track length (seconds) the period is the share of the track
/// one chunk represents, scaled by the pacing unit. A zero, negative or
/// non-finite length, or an empty payload, selects the fallback tick.
pub fn tick_interval(track_length: f64, payload_len: usize, config: &StreamConfig) -> Duration {
    if !(track_length.is_finite() && track_length > 0.0) || payload_len == 0 {
        return config.fallback_tick;
    }

    let share = track_length * config.chunk_size as f64 / payload_len as f64;
    match Duration::try_from_secs_f64(config.pacing_unit.as_secs_f64() * share) {
        Ok(interval) => interval.max(MIN_TICK),
        Err(_) => config.fallback_tick,
    }
}

/// One read from a [`ChunkCursor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkRead {
    /// Next slice; `last` is set when it was shorter than the chunk size
    Chunk { chunk: Bytes, last: bool },
    /// Cursor already sat at the end; nothing was read
    End,
}

/// Read position over an immutable payload
#[derive(Debug, Clone)]
pub struct ChunkCursor {
    payload: Bytes,
    chunk_size: usize,
    position: usize,
}

impl ChunkCursor {
    /// Create a cursor at the start of `payload`
    pub fn new(payload: Bytes, chunk_size: usize) -> Self {
        Self {
            payload,
            chunk_size,
            position: 0,
        }
    }

    /// Move back to the start of the payload
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Slice the next chunk and advance.
    ///
    /// Slices share the payload allocation.
    pub fn next_chunk(&mut self) -> ChunkRead {
        let len = self.payload.len();
        if self.position >= len {
            return ChunkRead::End;
        }

        let end = self.position.saturating_add(self.chunk_size).min(len);
        let chunk = self.payload.slice(self.position..end);
        self.position = end;

        let last = chunk.len() < self.chunk_size;
        ChunkRead::Chunk { chunk, last }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(data: &'static [u8], last: bool) -> ChunkRead {
        ChunkRead::Chunk {
            chunk: Bytes::from_static(data),
            last,
        }
    }

    #[test]
    fn test_fallback_when_length_unknown() {
        let config = StreamConfig::default();

        assert_eq!(tick_interval(0.0, 1000, &config), config.fallback_tick);
        assert_eq!(tick_interval(-3.0, 1000, &config), config.fallback_tick);
        assert_eq!(tick_interval(f64::NAN, 1000, &config), config.fallback_tick);
        assert_eq!(tick_interval(180.0, 0, &config), config.fallback_tick);
    }

    #[test]
    fn test_interval_proportional_to_chunk_share() {
        let config = StreamConfig::default();
        let interval = tick_interval(60.0, 1_000_000, &config);

        // 60 s * 16384 / 1_000_000 = 0.98304 s
        let expected = 60.0 * 16384.0 / 1_000_000.0;
        assert!((interval.as_secs_f64() - expected).abs() < 1e-6);

        // Doubling the track length doubles the tick
        let doubled = tick_interval(120.0, 1_000_000, &config);
        assert!((doubled.as_secs_f64() - 2.0 * expected).abs() < 1e-6);
    }

    #[test]
    fn test_interval_uses_pacing_unit() {
        let config = StreamConfig::default()
            .chunk_size(4)
            .pacing_unit(Duration::from_millis(8));

        // 8 ms * (10 s * 4 / 10) = 32 ms
        let interval = tick_interval(10.0, 10, &config);
        assert!((interval.as_secs_f64() - 0.032).abs() < 1e-9);
    }

    #[test]
    fn test_interval_never_zero() {
        let config = StreamConfig::default().chunk_size(1);

        assert_eq!(tick_interval(1e-9, usize::MAX, &config), MIN_TICK);
    }

    #[test]
    fn test_cursor_short_final_chunk() {
        let mut cursor = ChunkCursor::new(Bytes::from_static(b"ABCDEFGHIJ"), 4);

        assert_eq!(cursor.next_chunk(), chunk(b"ABCD", false));
        assert_eq!(cursor.next_chunk(), chunk(b"EFGH", false));
        assert_eq!(cursor.next_chunk(), chunk(b"IJ", true));
        assert_eq!(cursor.next_chunk(), ChunkRead::End);

        cursor.rewind();
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.next_chunk(), chunk(b"ABCD", false));
    }

    #[test]
    fn test_cursor_exact_multiple() {
        let mut cursor = ChunkCursor::new(Bytes::from_static(b"ABCDEFGH"), 4);

        assert_eq!(cursor.next_chunk(), chunk(b"ABCD", false));
        assert_eq!(cursor.next_chunk(), chunk(b"EFGH", false));
        assert_eq!(cursor.position(), 8);
        assert_eq!(cursor.next_chunk(), ChunkRead::End);
    }

    #[test]
    fn test_cursor_chunk_larger_than_payload() {
        let mut cursor = ChunkCursor::new(Bytes::from_static(b"AB"), 16384);

        assert_eq!(cursor.next_chunk(), chunk(b"AB", true));
        assert_eq!(cursor.next_chunk(), ChunkRead::End);
    }
}
