//! HTTP front end
//!
//! An axum router: catalogue endpoints answer with JSON, `/play/:param`
//! attaches the request to the track's live stream and streams chunks in
//! the response body until the listener or the stream goes away.

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::RadioServer;
pub use routes::{router, AppState};
