//! Broadcast fan-out for live listeners
//!
//! One [`BroadcastRegistry`] exists per running stream. Every connected
//! listener owns a [`ListenerHandle`]; the playback scheduler hands each chunk
//! to the registry, which offers it to every member at once.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<BroadcastRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ Mutex<members: HashMap<      │
//!                 │   ListenerId, Arc<Slot>>>    │
//!                 └──────────────┬───────────────┘
//!                                │
//!      ┌─────────────────────────┼─────────────────────────┐
//!      │                         │                         │
//!      ▼                         ▼                         ▼
//!  [Scheduler]             [ListenerPump]            [ListenerPump]
//!  ticker.tick()           handle.recv()             handle.recv()
//!      │                         │                         │
//!      └──► registry.broadcast()─┴──► write_all() ──► socket
//! ```
//!
//! # Backpressure
//!
//! A slot holds at most one parked receiver. A chunk is handed over only if
//! the pump is parked at the moment of the broadcast; a pump that is still
//! writing the previous chunk simply misses this one. The producer never
//! waits for a listener.
//!
//! # Zero-Copy Design
//!
//! Chunks are `bytes::Bytes` slices of the track payload, so every listener
//! receives its own immutable, reference-counted view of the same memory.

pub mod error;
pub mod handle;
pub mod registry;

pub use error::RegistryError;
pub use handle::{ListenerHandle, ListenerId, Ready};
pub use registry::{BroadcastRegistry, FanOut, RegistryStats};
