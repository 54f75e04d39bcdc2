//! Chunk decoding for the playback path
//!
//! Turns whatever the producer hands the scheduler (a self-describing WAV
//! blob, raw f32 samples, or a silence span) into a [`PcmBuffer`] at the
//! device rate.

use crate::error::{Error, Result};
use crate::playback::resampler::Resampler;
use std::io::Cursor;
use std::time::Duration;
use tracing::trace;
use vox_common::audio::I16_FULL_SCALE;
use vox_common::{PcmBuffer, StreamEvent};

/// Audio handed to [`PlaybackScheduler::enqueue`](crate::playback::PlaybackScheduler::enqueue)
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackChunk {
    /// Complete WAV document (16-bit PCM, mono); the header supplies the rate
    Wav(Vec<u8>),

    /// Raw mono samples at a known rate
    Samples { samples: Vec<f32>, sample_rate: u32 },

    /// Digital silence
    Silence { duration: Duration },
}

impl PlaybackChunk {
    /// Wrap a stitched event produced at `sample_rate`
    pub fn from_event(event: StreamEvent, sample_rate: u32) -> Self {
        match event {
            StreamEvent::Samples(samples) => PlaybackChunk::Samples {
                samples,
                sample_rate,
            },
            StreamEvent::Silence(duration) => PlaybackChunk::Silence { duration },
        }
    }

    /// Decode into a buffer at `device_rate`.
    ///
    /// # Errors
    /// `Decode` for unparseable WAV data, unsupported formats, non-finite
    /// samples, or a failed rate conversion
    pub fn decode(self, device_rate: u32) -> Result<PcmBuffer> {
        match self {
            PlaybackChunk::Wav(bytes) => decode_wav(&bytes, device_rate),
            PlaybackChunk::Samples {
                samples,
                sample_rate,
            } => {
                if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
                    return Err(Error::Decode(format!(
                        "non-finite sample at index {}",
                        index
                    )));
                }
                let samples = Resampler::resample(&samples, sample_rate, device_rate)?;
                Ok(PcmBuffer::from_f32(&samples, device_rate))
            }
            PlaybackChunk::Silence { duration } => {
                Ok(PcmBuffer::silence_for(duration, device_rate))
            }
        }
    }
}

fn decode_wav(bytes: &[u8], device_rate: u32) -> Result<PcmBuffer> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::Decode(format!("invalid WAV header: {}", e)))?;

    let spec = reader.spec();
    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(Error::Decode(format!(
            "unsupported WAV format: {} channels, {}-bit {:?}",
            spec.channels, spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<i16>, _>>()
        .map_err(|e| Error::Decode(format!("truncated WAV data: {}", e)))?;

    trace!(
        "Decoded WAV blob: {} frames at {}Hz",
        samples.len(),
        spec.sample_rate
    );

    if spec.sample_rate == device_rate {
        return Ok(PcmBuffer::new(samples, device_rate));
    }

    let float: Vec<f32> = samples.iter().map(|&s| s as f32 / I16_FULL_SCALE).collect();
    let resampled = Resampler::resample(&float, spec.sample_rate, device_rate)?;
    Ok(PcmBuffer::from_f32(&resampled, device_rate))
}
