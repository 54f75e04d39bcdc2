//! Self-contained WAV blocks
//!
//! Each stream event becomes one complete WAV document whose header already
//! carries the final sizes. Suited to chunked transports where a downstream
//! player receives independent blobs rather than one growing file.

use crate::encode::wav;
use std::time::Duration;
use vox_common::audio::silence_frames;
use vox_common::StreamEvent;

/// Encode samples as one WAV document.
///
/// Empty input yields an empty Vec (no zero-length WAV is produced).
pub fn encode_block(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(wav::HEADER_LEN + samples.len() * 2);
    out.extend_from_slice(&wav::header(sample_rate, samples.len() as u64));
    wav::encode_samples(samples, &mut out);
    out
}

/// Encode `frames` frames of silence as one WAV document.
pub fn encode_silence_block(frames: usize, sample_rate: u32) -> Vec<u8> {
    if frames == 0 {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(wav::HEADER_LEN + frames * 2);
    out.extend_from_slice(&wav::header(sample_rate, frames as u64));
    out.resize(wav::HEADER_LEN + frames * 2, 0);
    out
}

/// Event-to-block encoder at a fixed sample rate
#[derive(Debug, Clone, Copy)]
pub struct BlockEncoder {
    sample_rate: u32,
}

impl BlockEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Encode one event; empty events yield an empty Vec
    pub fn encode_event(&self, event: &StreamEvent) -> Vec<u8> {
        match event {
            StreamEvent::Samples(samples) => encode_block(samples, self.sample_rate),
            StreamEvent::Silence(duration) => self.encode_silence(*duration),
        }
    }

    /// Encode a silence span
    pub fn encode_silence(&self, duration: Duration) -> Vec<u8> {
        encode_silence_block(silence_frames(duration, self.sample_rate), self.sample_rate)
    }
}
