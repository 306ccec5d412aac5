//! Station: one live stream per track
//!
//! Listeners who ask for the same track share one registry and one scheduler.
//! The first listener starts the stream; it stops on its own once nobody has
//! listened for the configured idle timeout, and the next request starts a
//! fresh one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWrite;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{BroadcastRegistry, ListenerHandle, RegistryError};
use crate::error::Result;
use crate::library::{Track, TrackLibrary};
use crate::playback::{PlaybackSummary, Scheduler, StreamConfig};
use crate::pump::ListenerPump;
use crate::stats::StreamStats;

/// A running stream
struct ActiveStream {
    track: Track,
    registry: Arc<BroadcastRegistry>,
    cancel: CancellationToken,
    task: JoinHandle<PlaybackSummary>,
    started_at: Instant,
    tick: Duration,
}

impl ActiveStream {
    async fn is_live(&self) -> bool {
        !self.task.is_finished() && !self.registry.is_closed().await
    }
}

/// Track resolved to a live stream
#[derive(Clone)]
pub struct Tuned {
    pub track: Track,
    pub registry: Arc<BroadcastRegistry>,
}

/// Owns the library and every running stream
pub struct Station {
    library: TrackLibrary,
    config: StreamConfig,
    streams: RwLock<HashMap<u32, ActiveStream>>,
    shutdown: CancellationToken,
}

impl Station {
    /// Create a station serving `library`
    pub fn new(library: TrackLibrary, config: StreamConfig) -> Self {
        Self {
            library,
            config,
            streams: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// The song library
    pub fn library(&self) -> &TrackLibrary {
        &self.library
    }

    /// Stream configuration applied to new streams
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Resolve `param` and return its live stream, starting one if needed
    ///
    /// The track is loaded without holding the stream table, so tuning into
    /// one track never waits on another track's load. When two callers race
    /// to start the same track, the first to insert wins and the other
    /// joins its stream.
    pub async fn tune_in(&self, param: &str) -> Result<Tuned> {
        let track = self.library.resolve(param)?.clone();

        if let Some(registry) = self.live_registry(track.id).await {
            return Ok(Tuned { track, registry });
        }

        let loaded = self.library.load(&track).await?;
        let registry = Arc::new(BroadcastRegistry::new());
        let scheduler = Scheduler::new(
            Arc::clone(&registry),
            loaded.payload,
            loaded.play_length,
            self.config.clone(),
        )?;

        let mut streams = self.streams.write().await;
        if let Some(active) = streams.get(&track.id) {
            if active.is_live().await {
                tracing::debug!(track = track.id, "Stream started concurrently, joining it");
                return Ok(Tuned {
                    track,
                    registry: Arc::clone(&active.registry),
                });
            }
        }

        let tick = scheduler.tick_interval();
        let cancel = self.shutdown.child_token();
        let task = scheduler.spawn(cancel.clone());

        tracing::info!(
            track = track.id,
            title = %track.title,
            tick_ms = tick.as_millis() as u64,
            "Stream started for track"
        );

        let replaced = streams.insert(
            track.id,
            ActiveStream {
                track: track.clone(),
                registry: Arc::clone(&registry),
                cancel,
                task,
                started_at: Instant::now(),
                tick,
            },
        );
        if let Some(stale) = replaced {
            stale.cancel.cancel();
        }

        Ok(Tuned { track, registry })
    }

    async fn live_registry(&self, track_id: u32) -> Option<Arc<BroadcastRegistry>> {
        let streams = self.streams.read().await;
        let active = streams.get(&track_id)?;
        if active.is_live().await {
            Some(Arc::clone(&active.registry))
        } else {
            None
        }
    }

    /// Tune in and attach a pump writing to `writer`.
    ///
    /// A stream can stop between lookup and registration; in that case a
    /// fresh stream is started once and the attach is retried.
    pub async fn attach<W>(&self, param: &str, writer: W) -> Result<(Track, ListenerPump<W>)>
    where
        W: AsyncWrite + Unpin,
    {
        let handle = ListenerHandle::new();
        let mut tuned = self.tune_in(param).await?;

        if let Err(e) = tuned.registry.register(&handle).await {
            if e != RegistryError::Closed {
                return Err(e.into());
            }
            tracing::debug!(track = tuned.track.id, "Stream closed during attach, retrying");
            tuned = self.tune_in(param).await?;
            tuned.registry.register(&handle).await?;
        }

        let pump = ListenerPump::with_handle(tuned.registry, handle, writer);
        Ok((tuned.track, pump))
    }

    /// Stop the stream for `track_id`
    pub async fn stop(&self, track_id: u32) -> bool {
        match self.streams.write().await.remove(&track_id) {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop every stream and wait for the schedulers to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let streams: Vec<ActiveStream> = self.streams.write().await.drain().map(|(_, s)| s).collect();
        for active in streams {
            if let Err(e) = active.task.await {
                tracing::warn!(track = active.track.id, error = %e, "Scheduler task failed");
            }
        }

        tracing::info!("Station shut down");
    }

    /// Forget streams whose scheduler has stopped
    pub async fn prune(&self) -> usize {
        let mut streams = self.streams.write().await;
        let mut finished = Vec::new();
        for (id, active) in streams.iter() {
            if !active.is_live().await {
                finished.push(*id);
            }
        }

        for id in &finished {
            streams.remove(id);
            tracing::debug!(track = id, "Stopped stream pruned");
        }
        finished.len()
    }

    /// Spawn a background task that prunes stopped streams
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let station = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = station.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        station.prune().await;
                    }
                }
            }
        })
    }

    /// Number of live streams
    pub async fn live_streams(&self) -> usize {
        let streams = self.streams.read().await;
        let mut live = 0;
        for active in streams.values() {
            if active.is_live().await {
                live += 1;
            }
        }
        live
    }

    /// Statistics for every live stream, ordered by track id
    pub async fn stats(&self) -> Vec<StreamStats> {
        let streams = self.streams.read().await;
        let mut stats = Vec::with_capacity(streams.len());
        for active in streams.values() {
            if !active.is_live().await {
                continue;
            }
            stats.push(StreamStats {
                track_id: active.track.id,
                title: active.track.title.clone(),
                started_at: active.started_at,
                tick: active.tick,
                registry: active.registry.stats().await,
            });
        }
        stats.sort_by_key(|s| s.track_id);
        stats
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use crate::error::{Error, LibraryError, StreamError};
    use crate::library::catalog::tests::music_dir;
    use crate::library::LibraryConfig;
    use crate::pump::PumpExit;

    use super::*;

    async fn station(config: StreamConfig) -> Station {
        let dir = music_dir(&[
            ("Air on the G String.wav", vec![1u8; 64]),
            ("Clair de Lune.wav", vec![2u8; 64]),
            ("Silence.wav", Vec::new()),
        ])
        .await;
        let library = TrackLibrary::open(LibraryConfig::with_dir(dir)).await.unwrap();
        Station::new(library, config)
    }

    fn fast() -> StreamConfig {
        StreamConfig::default()
            .chunk_size(16)
            .fallback_tick(Duration::from_millis(5))
            .keep_alive()
    }

    async fn wait_closed(registry: &BroadcastRegistry) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !registry.is_closed().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_same_track_shares_one_stream() {
        let station = station(fast()).await;

        let first = station.tune_in("1").await.unwrap();
        let again = station.tune_in("air on").await.unwrap();
        let other = station.tune_in("clair").await.unwrap();

        assert_eq!(first.track.id, 1);
        assert!(Arc::ptr_eq(&first.registry, &again.registry));
        assert!(!Arc::ptr_eq(&first.registry, &other.registry));
        assert_eq!(station.live_streams().await, 2);

        station.shutdown().await;
    }

    #[tokio::test]
    async fn test_tune_in_errors() {
        let station = station(fast()).await;

        assert!(matches!(
            station.tune_in("nocturne").await,
            Err(Error::Library(LibraryError::TrackNotFound(_)))
        ));
        assert!(matches!(
            station.tune_in("silence").await,
            Err(Error::Stream(StreamError::EmptyPayload))
        ));
        assert_eq!(station.live_streams().await, 0);
    }

    #[tokio::test]
    async fn test_idle_stream_is_replaced() {
        let station = station(fast().idle_timeout(Duration::from_millis(20))).await;

        let first = station.tune_in("1").await.unwrap();
        wait_closed(&first.registry).await;
        assert_eq!(station.live_streams().await, 0);

        let second = station.tune_in("1").await.unwrap();
        assert!(!Arc::ptr_eq(&first.registry, &second.registry));
        assert!(!second.registry.is_closed().await);

        station.shutdown().await;
    }

    #[tokio::test]
    async fn test_prune_forgets_stopped_streams() {
        let station = station(fast().idle_timeout(Duration::from_millis(20))).await;

        let idle = station.tune_in("1").await.unwrap();
        station.tune_in("2").await.unwrap();

        // An explicit stop removes the entry at once
        assert!(station.stop(2).await);
        assert!(!station.stop(2).await);

        // An idle stream stays listed until pruned
        wait_closed(&idle.registry).await;
        assert_eq!(station.live_streams().await, 0);

        assert_eq!(station.prune().await, 1);
        assert_eq!(station.prune().await, 0);

        station.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_tune_in_starts_one_stream() {
        let station = station(fast()).await;

        let (first, second) = tokio::join!(station.tune_in("1"), station.tune_in("air on"));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert!(Arc::ptr_eq(&first.registry, &second.registry));
        assert_eq!(station.live_streams().await, 1);
        assert_eq!(station.stats().await.len(), 1);

        station.shutdown().await;
    }

    #[tokio::test]
    async fn test_attach_streams_until_shutdown() {
        let station = station(fast()).await;
        let (client, mut server) = tokio::io::duplex(256);

        let (track, pump) = station.attach("2", client).await.unwrap();
        assert_eq!(track.title, "Clair de Lune");
        let task = tokio::spawn(pump.run());

        let mut buf = [0u8; 32];
        server.read_exact(&mut buf).await.unwrap();
        assert!(buf.iter().all(|b| *b == 2));

        let stats = station.stats().await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].track_id, 2);
        assert_eq!(stats[0].registry.listeners, 1);
        assert_eq!(stats[0].tick, Duration::from_millis(5));

        station.shutdown().await;
        let report = task.await.unwrap();
        assert!(matches!(report.exit, PumpExit::StreamEnded));
        assert!(report.stats.bytes_written >= 32);
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_with_station() {
        let station = Arc::new(station(fast().idle_timeout(Duration::from_millis(10))).await);
        let cleanup = station.spawn_cleanup_task(Duration::from_millis(5));

        let tuned = station.tune_in("1").await.unwrap();
        wait_closed(&tuned.registry).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        // The cleanup task already forgot the stopped entry
        assert_eq!(station.prune().await, 0);

        station.shutdown().await;
        tokio::time::timeout(Duration::from_secs(1), cleanup)
            .await
            .unwrap()
            .unwrap();
    }
}
