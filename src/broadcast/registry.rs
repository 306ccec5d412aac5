//! Broadcast registry implementation
//!
//! The set of listeners attached to one stream. A single mutex guards both
//! membership changes and the whole fan-out pass, so a broadcast always sees
//! a consistent member set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use super::error::RegistryError;
use super::handle::{ListenerHandle, ListenerId, Offer, Slot};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

struct Members {
    slots: HashMap<ListenerId, Arc<Slot>>,
    closed: bool,
}

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Members that were waiting and took the chunk
    pub delivered: usize,
    /// Members that were busy and lost the chunk
    pub dropped: usize,
}

/// Snapshot of registry counters
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Current member count
    pub listeners: usize,
    /// Broadcast calls that reached at least the member loop
    pub chunks_broadcast: u64,
    /// Payload bytes passed to broadcast
    pub bytes_broadcast: u64,
    /// Per-member successful handoffs
    pub delivered: u64,
    /// Per-member drops
    pub dropped: u64,
    /// Whether the registry has been closed
    pub closed: bool,
}

/// Concurrency-safe set of listener handles for one stream
pub struct BroadcastRegistry {
    id: u64,
    members: Mutex<Members>,
    chunks_broadcast: AtomicU64,
    bytes_broadcast: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            members: Mutex::new(Members {
                slots: HashMap::new(),
                closed: false,
            }),
            chunks_broadcast: AtomicU64::new(0),
            bytes_broadcast: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Add a handle to the member set.
    ///
    /// Registering the same handle twice is a no-op. Fails if the registry is
    /// closed, the handle was retired, or it belongs to another registry.
    pub async fn register(&self, handle: &ListenerHandle) -> Result<(), RegistryError> {
        let mut members = self.members.lock().await;

        if members.closed {
            return Err(RegistryError::Closed);
        }

        let id = handle.id();
        if handle.slot().claim(id, self.id)? {
            members.slots.insert(id, Arc::clone(handle.slot()));

            tracing::info!(
                listener = %id,
                listeners = members.slots.len(),
                "Listener registered"
            );
        }

        Ok(())
    }

    /// Remove a handle from the member set.
    ///
    /// The handle is retired and cannot be registered again. Returns `false`
    /// if it was not a member, which is not an error.
    pub async fn unregister(&self, id: ListenerId) -> bool {
        let mut members = self.members.lock().await;

        match members.slots.remove(&id) {
            Some(slot) => {
                slot.retire();
                tracing::info!(
                    listener = %id,
                    listeners = members.slots.len(),
                    "Listener unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Offer `chunk` to every member without blocking.
    ///
    /// Members whose pump is parked on its slot receive a reference-counted
    /// copy of the chunk. Everyone else loses this chunk; nothing is queued
    /// or retried. Retired members found along the way are pruned.
    pub async fn broadcast(&self, chunk: &Bytes) -> FanOut {
        let mut members = self.members.lock().await;
        let mut fan_out = FanOut::default();

        if members.closed {
            return fan_out;
        }

        members.slots.retain(|id, slot| {
            if slot.is_retired() {
                tracing::debug!(listener = %id, "Pruned retired listener");
                return false;
            }
            match slot.offer(chunk) {
                Offer::Delivered => fan_out.delivered += 1,
                Offer::Dropped => fan_out.dropped += 1,
            }
            true
        });

        self.chunks_broadcast.fetch_add(1, Ordering::Relaxed);
        self.bytes_broadcast
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        self.delivered
            .fetch_add(fan_out.delivered as u64, Ordering::Relaxed);
        self.dropped
            .fetch_add(fan_out.dropped as u64, Ordering::Relaxed);

        fan_out
    }

    /// Close the registry: retire every member and refuse new ones.
    ///
    /// Parked pumps wake up with end of stream.
    pub async fn close(&self) {
        let mut members = self.members.lock().await;
        if members.closed {
            return;
        }

        members.closed = true;
        let count = members.slots.len();
        for (_, slot) in members.slots.drain() {
            slot.retire();
        }

        tracing::debug!(listeners = count, "Registry closed");
    }

    /// Whether [`close`](Self::close) has been called
    pub async fn is_closed(&self) -> bool {
        self.members.lock().await.closed
    }

    /// Number of current members
    pub async fn listener_count(&self) -> usize {
        self.members.lock().await.slots.len()
    }

    /// Number of members parked on their slot right now
    pub async fn ready_count(&self) -> usize {
        self.members
            .lock()
            .await
            .slots
            .values()
            .filter(|slot| slot.is_waiting())
            .count()
    }

    /// Whether `id` is a current member
    pub async fn contains(&self, id: ListenerId) -> bool {
        self.members.lock().await.slots.contains_key(&id)
    }

    /// Sorted ids of the current members
    pub async fn members(&self) -> Vec<ListenerId> {
        let mut ids: Vec<ListenerId> = self.members.lock().await.slots.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Counter snapshot
    pub async fn stats(&self) -> RegistryStats {
        let members = self.members.lock().await;
        RegistryStats {
            listeners: members.slots.len(),
            chunks_broadcast: self.chunks_broadcast.load(Ordering::Relaxed),
            bytes_broadcast: self.bytes_broadcast.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            closed: members.closed,
        }
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::new()
    }
}
