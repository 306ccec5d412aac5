//! Listener handles
//!
//! A [`ListenerHandle`] is the per-connection end of the fan-out. Its slot has
//! rendezvous semantics: a chunk offered by the registry is taken only if the
//! owning pump is parked in [`ListenerHandle::recv`] at that moment, otherwise
//! the chunk is dropped for this listener.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::oneshot;

use super::error::RegistryError;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, never reused listener identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Where a handle stands with respect to registries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Membership {
    /// Created, not registered yet
    Detached,
    /// Member of the registry with this id
    Member(u64),
    /// Unregistered, dropped, or its registry closed
    Retired,
}

/// Result of offering a chunk to one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    Delivered,
    Dropped,
}

struct SlotState {
    waiter: Option<oneshot::Sender<Bytes>>,
    membership: Membership,
}

/// Handoff location shared between a handle and its registry
pub(crate) struct Slot {
    state: Mutex<SlotState>,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                waiter: None,
                membership: Membership::Detached,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand `chunk` to a parked receiver, or drop it
    pub(crate) fn offer(&self, chunk: &Bytes) -> Offer {
        match self.lock().waiter.take() {
            Some(tx) => match tx.send(chunk.clone()) {
                Ok(()) => Offer::Delivered,
                Err(_) => Offer::Dropped,
            },
            None => Offer::Dropped,
        }
    }

    /// Bind this slot to a registry.
    ///
    /// Returns `true` when the slot was newly claimed, `false` when it is
    /// already a member of the same registry.
    pub(crate) fn claim(&self, id: ListenerId, registry_id: u64) -> Result<bool, RegistryError> {
        let mut state = self.lock();
        match state.membership {
            Membership::Detached => {
                state.membership = Membership::Member(registry_id);
                Ok(true)
            }
            Membership::Member(current) if current == registry_id => Ok(false),
            Membership::Member(_) => Err(RegistryError::ForeignHandle(id)),
            Membership::Retired => Err(RegistryError::HandleRetired(id)),
        }
    }

    /// Retire the slot; a parked receiver observes end of stream
    pub(crate) fn retire(&self) {
        let mut state = self.lock();
        state.membership = Membership::Retired;
        state.waiter = None;
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.lock().membership == Membership::Retired
    }

    pub(crate) fn is_waiting(&self) -> bool {
        self.lock()
            .waiter
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    fn arm(&self) -> Option<oneshot::Receiver<Bytes>> {
        let mut state = self.lock();
        if state.membership == Membership::Retired {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        state.waiter = Some(tx);
        Some(rx)
    }
}

/// Per-connection listener state
///
/// One handle is created per inbound connection and consumed by exactly one
/// pump. Dropping the handle retires it, so a registry never delivers to a
/// handle whose owner has gone away.
pub struct ListenerHandle {
    id: ListenerId,
    slot: Arc<Slot>,
}

impl ListenerHandle {
    /// Create a fresh, unregistered handle
    pub fn new() -> Self {
        Self {
            id: ListenerId::next(),
            slot: Arc::new(Slot::new()),
        }
    }

    /// Identity of this handle
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether the handle can no longer receive chunks
    pub fn is_retired(&self) -> bool {
        self.slot.is_retired()
    }

    /// Park on the slot right now and return a future for the next chunk.
    ///
    /// The handle counts as waiting from the moment this returns, which lets
    /// callers arm the slot before a broadcast happens. Resolves to `None`
    /// once the handle is retired.
    pub fn ready(&mut self) -> Ready<'_> {
        Ready {
            rx: self.slot.arm(),
            _handle: PhantomData,
        }
    }

    /// Wait for the next chunk; `None` means the stream is over for this handle
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.ready().await
    }

    pub(crate) fn slot(&self) -> &Arc<Slot> {
        &self.slot
    }
}

impl Default for ListenerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.slot.retire();
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("retired", &self.is_retired())
            .finish()
    }
}

/// Future returned by [`ListenerHandle::ready`]
///
/// Borrows the handle mutably so only one read can be outstanding.
#[must_use = "a ready slot only receives while the future is polled"]
pub struct Ready<'a> {
    rx: Option<oneshot::Receiver<Bytes>>,
    _handle: PhantomData<&'a mut ListenerHandle>,
}

impl Future for Ready<'_> {
    type Output = Option<Bytes>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut().rx.as_mut() {
            Some(rx) => Pin::new(rx).poll(cx).map(Result::ok),
            None => Poll::Ready(None),
        }
    }
}
