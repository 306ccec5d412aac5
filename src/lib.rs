//! airwave: an internet-radio style streaming server
//!
//! Every track in a music directory can be played as a live stream. The
//! first listener to ask for a track starts a paced scheduler that loops the
//! file forever; later listeners join it mid-flight and hear whatever is
//! being broadcast from that moment on, exactly like tuning into a radio.
//!
//! # Architecture
//!
//! ```text
//!  TrackLibrary ──load──► Scheduler ──broadcast──► BroadcastRegistry
//!                          (one tick                 │   │   │
//!                           per chunk)               ▼   ▼   ▼
//!                                               ListenerPump (one per client)
//!                                                    │
//!                                                    ▼
//!                                               HTTP response body
//! ```
//!
//! Delivery is a rendezvous: a chunk reaches only the listeners that are
//! already waiting for it when it is broadcast. A slow listener misses
//! chunks instead of holding the stream back.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use airwave::library::{LibraryConfig, TrackLibrary};
//! use airwave::playback::StreamConfig;
//! use airwave::{RadioServer, ServerConfig, Station};
//!
//! #[tokio::main]
//! async fn main() -> airwave::Result<()> {
//!     let library = TrackLibrary::open(LibraryConfig::with_dir("songs")).await?;
//!     let station = Arc::new(Station::new(library, StreamConfig::default()));
//!
//!     let server = RadioServer::new(ServerConfig::default(), station);
//!     server.run().await
//! }
//! ```

pub mod broadcast;
pub mod error;
pub mod library;
pub mod media;
pub mod playback;
pub mod pump;
pub mod server;
pub mod station;
pub mod stats;

pub use broadcast::{BroadcastRegistry, ListenerHandle, ListenerId};
pub use error::{Error, Result};
pub use playback::{Scheduler, StreamConfig};
pub use pump::ListenerPump;
pub use server::{RadioServer, ServerConfig};
pub use station::Station;
