//! Read-only song library
//!
//! Tracks are the audio files of one music directory. The library resolves
//! request parameters to tracks and loads a track's bytes for streaming.

pub mod catalog;
pub mod track;

pub use catalog::{LibraryConfig, TrackLibrary};
pub use track::{LoadedTrack, Track};
