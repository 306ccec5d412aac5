//! Container inspection through symphonia
//!
//! Both helpers are synchronous and may walk every packet of a file; async
//! callers run them on the blocking pool.

use std::io::ErrorKind;

use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::{Hint, ProbeResult};

use crate::error::MediaError;

use super::format::AudioFormat;

fn open(source: Box<dyn MediaSource>, format: AudioFormat) -> Result<ProbeResult, MediaError> {
    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let stream = MediaSourceStream::new(source, Default::default());
    let opened = symphonia::default::get_probe().format(
        &hint,
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    Ok(opened)
}

/// Artist tag of the source, if it carries one
///
/// Tags in front of the container (ID3v2) win over tags inside it.
pub fn artist(source: Box<dyn MediaSource>, format: AudioFormat) -> Result<Option<String>, MediaError> {
    let mut opened = open(source, format)?;

    let leading = opened
        .metadata
        .get()
        .as_ref()
        .and_then(|metadata| metadata.current().and_then(artist_of));
    if leading.is_some() {
        return Ok(leading);
    }

    Ok(opened.format.metadata().current().and_then(artist_of))
}

fn artist_of(revision: &MetadataRevision) -> Option<String> {
    revision
        .tags()
        .iter()
        .find(|tag| matches!(tag.std_key, Some(StandardTagKey::Artist)))
        .map(|tag| tag.value.to_string().trim().to_string())
        .filter(|artist| !artist.is_empty())
}

/// Play length of the default track in seconds
///
/// Uses the frame count from the container header when there is one,
/// otherwise sums packet durations up to the end of the stream.
pub fn play_length(source: Box<dyn MediaSource>, format: AudioFormat) -> Result<f64, MediaError> {
    let mut reader = open(source, format)?.format;

    let track = reader.default_track().ok_or(MediaError::NoTrack)?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let frames = match params.n_frames {
        Some(frames) => frames,
        None => count_frames(reader.as_mut(), track_id)?,
    };

    if let Some(time_base) = params.time_base {
        let time = time_base.calc_time(frames);
        return Ok(time.seconds as f64 + time.frac);
    }
    match params.sample_rate {
        Some(rate) if rate > 0 => Ok(frames as f64 / f64::from(rate)),
        _ => Ok(0.0),
    }
}

fn count_frames(reader: &mut dyn FormatReader, track_id: u32) -> Result<u64, MediaError> {
    let mut frames = 0u64;
    loop {
        match reader.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    frames += packet.dur;
                }
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                return Ok(frames)
            }
            Err(SymphoniaError::ResetRequired) => return Ok(frames),
            Err(e) => return Err(e.into()),
        }
    }
}
