//! Error types
//!
//! Dropped frames and end-of-payload are playback policy, not errors, so
//! nothing here describes them.

use std::fmt;
use std::io;

use symphonia::core::errors::Error as SymphoniaError;

use crate::broadcast::RegistryError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug)]
pub enum Error {
    /// Socket or file I/O failure
    Io(io::Error),
    /// Broadcast registry refused an operation
    Registry(RegistryError),
    /// Scheduler refused to start
    Stream(StreamError),
    /// Malformed audio data
    Media(MediaError),
    /// Track catalogue failure
    Library(LibraryError),
}

/// Reasons a scheduler refuses to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Payload has no bytes; looping it would spin without ever sleeping
    EmptyPayload,
    /// Chunk size of zero
    ZeroChunkSize,
    /// Fallback tick of zero
    ZeroTick,
}

/// Audio container errors
#[derive(Debug)]
pub enum MediaError {
    /// No demuxer recognises the data
    Unsupported(String),
    /// Container holds no audio track
    NoTrack,
    /// Container is recognised but damaged
    Malformed(String),
    /// Reading the source failed
    Io(io::Error),
}

/// Track catalogue errors
#[derive(Debug)]
pub enum LibraryError {
    /// No track matches the id or title
    TrackNotFound(String),
    /// Music directory could not be read
    Unreadable { path: String, source: io::Error },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Stream(e) => write!(f, "Stream error: {}", e),
            Error::Media(e) => write!(f, "Media error: {}", e),
            Error::Library(e) => write!(f, "Library error: {}", e),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::EmptyPayload => write!(f, "Refusing to stream an empty payload"),
            StreamError::ZeroChunkSize => write!(f, "Chunk size must be non-zero"),
            StreamError::ZeroTick => write!(f, "Fallback tick must be non-zero"),
        }
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Unsupported(what) => write!(f, "Unsupported audio: {}", what),
            MediaError::NoTrack => write!(f, "No audio track"),
            MediaError::Malformed(what) => write!(f, "Malformed audio: {}", what),
            MediaError::Io(e) => write!(f, "Cannot read audio: {}", e),
        }
    }
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::TrackNotFound(param) => write!(f, "Track not found: {}", param),
            LibraryError::Unreadable { path, source } => {
                write!(f, "Cannot read {}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Media(MediaError::Io(e)) => Some(e),
            Error::Library(LibraryError::Unreadable { source, .. }) => Some(source),
            _ => None,
        }
    }
}

impl std::error::Error for StreamError {}
impl std::error::Error for MediaError {}
impl std::error::Error for LibraryError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<StreamError> for Error {
    fn from(e: StreamError) -> Self {
        Error::Stream(e)
    }
}

impl From<MediaError> for Error {
    fn from(e: MediaError) -> Self {
        Error::Media(e)
    }
}

impl From<io::Error> for MediaError {
    fn from(e: io::Error) -> Self {
        MediaError::Io(e)
    }
}

impl From<SymphoniaError> for MediaError {
    fn from(e: SymphoniaError) -> Self {
        match e {
            SymphoniaError::IoError(e) => MediaError::Io(e),
            SymphoniaError::Unsupported(what) => MediaError::Unsupported(what.to_string()),
            other => MediaError::Malformed(other.to_string()),
        }
    }
}

impl From<LibraryError> for Error {
    fn from(e: LibraryError) -> Self {
        Error::Library(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err: Error = StreamError::EmptyPayload.into();
        assert_eq!(err.to_string(), "Stream error: Refusing to stream an empty payload");

        let err: Error = LibraryError::TrackNotFound("42".into()).into();
        assert_eq!(err.to_string(), "Library error: Track not found: 42");
    }

    #[test]
    fn test_symphonia_errors() {
        let err: MediaError = SymphoniaError::Unsupported("no suitable format reader found").into();
        assert!(matches!(err, MediaError::Unsupported(_)));

        let err: MediaError = SymphoniaError::DecodeError("mpa: invalid main_data_begin").into();
        let message = err.to_string();
        assert!(message.starts_with("Malformed audio: "));
        assert!(message.contains("invalid main_data_begin"));

        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream");
        let err: Error = MediaError::from(SymphoniaError::IoError(eof)).into();
        assert!(matches!(err, Error::Media(MediaError::Io(_))));
    }

    #[test]
    fn test_io_source() {
        use std::error::Error as _;

        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(err.source().is_some());
    }
}
