// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decoding of sample files into memory.
//!
//! Samples are decoded entirely into memory at their native sample rate. The
//! mixer resamples during playback, so the store does not need to know the
//! output rate before the audio graph exists.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::SampleError;

/// A decoded sample that can be shared between voices.
#[derive(Clone)]
pub struct DecodedSample {
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl DecodedSample {
    /// Wraps interleaved samples.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> DecodedSample {
        DecodedSample {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    pub fn data(&self) -> &Arc<Vec<f32>> {
        &self.data
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for DecodedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedSample")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Decodes a whole file. Blocking; callers run this on the blocking pool.
pub(super) fn decode_file(location: &str) -> Result<DecodedSample, SampleError> {
    let started = Instant::now();
    let path = Path::new(location);
    let decode_error = |reason: String| SampleError::Decode {
        location: location.to_string(),
        reason,
    };

    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SampleError::Missing {
            location: location.to_string(),
        },
        _ => decode_error(e.to_string()),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error(e.to_string()))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_error("no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| decode_error("sample rate not specified".to_string()))?;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channel_count: u16 = 0;
    let mut sample_buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channel_count = spec.channels.count() as u16;

                let frames = decoded.capacity();
                if sample_buffer
                    .as_ref()
                    .map_or(true, |b| b.capacity() < frames * spec.channels.count())
                {
                    sample_buffer = Some(SampleBuffer::<f32>::new(frames as u64, spec));
                }
                if let Some(buffer) = sample_buffer.as_mut() {
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packets are skipped, the rest of the file may still be usable.
                warn!(location, error = e, "Skipping undecodable packet");
            }
            Err(e) => return Err(decode_error(e.to_string())),
        }
    }

    if channel_count == 0 || samples.is_empty() {
        return Err(decode_error("no audio frames decoded".to_string()));
    }

    let decoded = DecodedSample::new(samples, channel_count, sample_rate);
    debug!(
        location,
        channels = channel_count,
        sample_rate,
        duration_ms = decoded.duration().as_millis(),
        memory_kb = decoded.memory_size() / 1024,
        elapsed_ms = started.elapsed().as_millis(),
        "Sample decoded"
    );
    Ok(decoded)
}
