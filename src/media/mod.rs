//! Audio media handling
//!
//! Formats are detected from the file extension. Play length and artist
//! tags come from the container, read through symphonia.

pub mod format;
pub mod container;

pub use format::AudioFormat;
