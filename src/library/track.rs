//! Track metadata

use std::path::PathBuf;

use bytes::Bytes;
use serde::Serialize;

use crate::media::AudioFormat;

/// One song in the library
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    /// 1-based id, stable for the lifetime of the library
    pub id: u32,
    /// File name without its final extension
    pub title: String,
    /// Artist from the ID3 tag, if any
    pub artist: Option<String>,
    /// Audio format
    #[serde(rename = "file_type")]
    pub format: AudioFormat,
    /// File name inside the music directory
    #[serde(rename = "path")]
    pub file_name: String,
    /// Full path on disk
    #[serde(skip)]
    pub location: PathBuf,
}

impl Track {
    /// Title with spaces removed and lowercased, as used for searching
    pub(crate) fn search_key(&self) -> String {
        normalize(&self.title)
    }
}

/// Lowercase and strip spaces
pub(crate) fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| *c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}

/// A track read into memory, ready to stream
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    pub track: Track,
    /// Whole file contents
    pub payload: Bytes,
    /// Estimated play length in seconds, 0.0 when unknown
    pub play_length: f64,
}
