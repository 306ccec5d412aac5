//! Listener pump
//!
//! Drains one [`ListenerHandle`] into a transport. Each chunk is written and
//! flushed as soon as it arrives; the pump keeps no buffer of its own. A
//! failed write unregisters the handle and ends the pump without affecting
//! the scheduler or any other listener.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::broadcast::{BroadcastRegistry, ListenerHandle, ListenerId, RegistryError};
use crate::stats::ListenerStats;

/// Why a pump stopped
#[derive(Debug)]
pub enum PumpExit {
    /// Registry closed; the stream is over
    StreamEnded,
    /// Transport rejected a write; the handle has been unregistered
    WriteFailed(io::Error),
}

/// Final report of a pump
#[derive(Debug)]
pub struct PumpReport {
    /// Listener that ran
    pub id: ListenerId,
    /// Why it stopped
    pub exit: PumpExit,
    /// What it wrote
    pub stats: ListenerStats,
}

/// Single reader of one listener handle
pub struct ListenerPump<W> {
    registry: Arc<BroadcastRegistry>,
    handle: ListenerHandle,
    writer: W,
    stats: ListenerStats,
}

impl<W> ListenerPump<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a handle for this connection and register it
    pub async fn attach(registry: Arc<BroadcastRegistry>, writer: W) -> Result<Self, RegistryError> {
        let handle = ListenerHandle::new();
        registry.register(&handle).await?;

        Ok(Self::with_handle(registry, handle, writer))
    }

    /// Wrap a handle that is already registered with `registry`
    pub(crate) fn with_handle(registry: Arc<BroadcastRegistry>, handle: ListenerHandle, writer: W) -> Self {
        Self {
            registry,
            handle,
            writer,
            stats: ListenerStats::new(),
        }
    }

    /// Identity of the underlying handle
    pub fn id(&self) -> ListenerId {
        self.handle.id()
    }

    /// Mutable access to the transport, e.g. to send a preamble before `run`
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Forward chunks until the stream ends or a write fails
    pub async fn run(mut self) -> PumpReport {
        let id = self.handle.id();

        let exit = loop {
            let Some(chunk) = self.handle.recv().await else {
                break PumpExit::StreamEnded;
            };

            if let Err(e) = self.write_chunk(&chunk).await {
                self.registry.unregister(id).await;
                break PumpExit::WriteFailed(e);
            }

            self.stats.record_chunk(chunk.len());
        };

        match &exit {
            PumpExit::StreamEnded => {
                tracing::debug!(listener = %id, chunks = self.stats.chunks_written, "Stream ended")
            }
            PumpExit::WriteFailed(e) => tracing::debug!(
                listener = %id,
                chunks = self.stats.chunks_written,
                error = %e,
                "Listener write failed"
            ),
        }

        PumpReport {
            id,
            exit,
            stats: self.stats,
        }
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.writer.write_all(chunk).await?;
        self.writer.flush().await
    }
}
