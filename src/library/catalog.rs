//! Directory-backed track catalogue

use std::io::Cursor;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;

use crate::error::{LibraryError, MediaError, Result};
use crate::media::{container, AudioFormat};

use super::track::{normalize, LoadedTrack, Track};

/// Library configuration
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Directory holding the audio files
    pub music_dir: PathBuf,
    /// Formats picked up by the scan
    pub formats: Vec<AudioFormat>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            music_dir: PathBuf::from("songs"),
            formats: AudioFormat::ALL.to_vec(),
        }
    }
}

impl LibraryConfig {
    /// Config for a music directory with every format enabled
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            music_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Restrict the scan to these formats
    pub fn formats(mut self, formats: &[AudioFormat]) -> Self {
        self.formats = formats.to_vec();
        self
    }
}

/// Read-only set of tracks found in one directory
#[derive(Debug)]
pub struct TrackLibrary {
    config: LibraryConfig,
    tracks: Vec<Track>,
}

impl TrackLibrary {
    /// Scan the music directory.
    ///
    /// Files are ordered by name and numbered from 1. Sub-directories and
    /// files with unknown extensions are ignored.
    pub async fn open(config: LibraryConfig) -> Result<Self> {
        let dir = &config.music_dir;
        let unreadable = |source| LibraryError::Unreadable {
            path: dir.display().to_string(),
            source,
        };

        let mut entries = fs::read_dir(dir).await.map_err(unreadable)?;
        let mut found = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            let path = entry.path();
            let Some(format) = AudioFormat::from_path(&path) else {
                continue;
            };
            if !config.formats.contains(&format) || !entry.file_type().await?.is_file() {
                continue;
            }
            found.push((path, format));
        }

        found.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));

        let mut tracks = Vec::with_capacity(found.len());
        for (index, (path, format)) in found.into_iter().enumerate() {
            let artist = match read_artist(path.clone(), format).await {
                Ok(artist) => artist,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "No artist tag");
                    None
                }
            };

            tracks.push(Track {
                id: index as u32 + 1,
                title: title_of(&path),
                artist,
                format,
                file_name: file_name_of(&path),
                location: path,
            });
        }

        tracing::info!(
            dir = %config.music_dir.display(),
            tracks = tracks.len(),
            "Library scanned"
        );

        Ok(Self { config, tracks })
    }

    /// Library configuration
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// All tracks in id order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Look up by id
    pub fn get(&self, id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Tracks whose title contains `term`, ignoring case and spaces
    pub fn search(&self, term: &str) -> Vec<&Track> {
        let needle = normalize(term);
        self.tracks
            .iter()
            .filter(|t| t.search_key().contains(&needle))
            .collect()
    }

    /// Resolve a request parameter: a number is an id, anything else a title
    /// search whose first hit wins
    pub fn resolve(&self, param: &str) -> std::result::Result<&Track, LibraryError> {
        let found = match param.parse::<u32>() {
            Ok(id) => self.get(id),
            Err(_) => self.search(param).into_iter().next(),
        };
        found.ok_or_else(|| LibraryError::TrackNotFound(param.to_string()))
    }

    /// Read a track into memory and measure its play length
    ///
    /// A container that cannot be measured plays with a length of zero.
    pub async fn load(&self, track: &Track) -> Result<LoadedTrack> {
        let payload = Bytes::from(fs::read(&track.location).await?);

        let play_length = match measure(payload.clone(), track.format).await {
            Ok(seconds) => seconds,
            Err(e) => {
                tracing::debug!(track = track.id, error = %e, "Play length unknown");
                0.0
            }
        };

        tracing::debug!(
            track = track.id,
            bytes = payload.len(),
            play_length = play_length,
            "Track loaded"
        );

        Ok(LoadedTrack {
            track: track.clone(),
            payload,
            play_length,
        })
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name without its final extension; inner dots are kept
fn title_of(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn read_artist(path: PathBuf, format: AudioFormat) -> std::result::Result<Option<String>, MediaError> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)?;
        container::artist(Box::new(file), format)
    })
    .await
    .map_err(|e| MediaError::Io(e.into()))?
}

async fn measure(payload: Bytes, format: AudioFormat) -> std::result::Result<f64, MediaError> {
    tokio::task::spawn_blocking(move || container::play_length(Box::new(Cursor::new(payload)), format))
        .await
        .map_err(|e| MediaError::Io(e.into()))?
}
