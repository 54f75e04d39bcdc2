//! Core audio data types
//!
//! Defines the data contract shared by the stitcher, the encoders and the
//! playback scheduler.
//!
//! **Format:**
//! - Synthesized samples are f32 (nominally -1.0 to 1.0), mono
//! - Quantized samples are i16, little-endian on the wire, mono
//! - One "frame" = one mono sample

use crate::{Error, Result};
use std::time::Duration;

/// Full-scale value used when quantizing f32 samples to i16.
///
/// Clamping happens before scaling, so -1.0 maps to -32767, never -32768.
pub const I16_FULL_SCALE: f32 = 32767.0;

/// Quantize one f32 sample to 16-bit signed PCM.
///
/// Clamps to [-1.0, 1.0], scales by 32767 and truncates toward zero.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * I16_FULL_SCALE) as i16
}

/// Convert a silence duration to a frame count at the given sample rate.
///
/// Rounds to the nearest frame. Used by every sink so file, block and live
/// output agree on silence length.
pub fn silence_frames(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).round() as usize
}

/// One unit of synthesized audio as produced by a synthesis engine.
///
/// `pause_after_ms` is signed at this boundary so that engines reporting a
/// negative pause can be rejected instead of silently wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Mono f32 samples
    pub samples: Vec<f32>,

    /// Authored silence following this chunk, in milliseconds
    pub pause_after_ms: i64,
}

impl Chunk {
    /// Create a chunk with a trailing pause
    pub fn new(samples: Vec<f32>, pause_after_ms: i64) -> Self {
        Self {
            samples,
            pause_after_ms,
        }
    }

    /// Create a chunk that is pure silence (no samples, only a pause)
    pub fn pause(pause_after_ms: i64) -> Self {
        Self::new(Vec::new(), pause_after_ms)
    }

    /// Check the chunk for malformed content.
    ///
    /// # Errors
    /// - Negative pause
    /// - NaN or infinite sample
    pub fn validate(&self) -> Result<()> {
        if self.pause_after_ms < 0 {
            return Err(Error::InvalidInput(format!(
                "negative pause: {}ms",
                self.pause_after_ms
            )));
        }

        if let Some(index) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "non-finite sample {} at index {}",
                self.samples[index], index
            )));
        }

        Ok(())
    }

    /// Trailing pause as a Duration (zero for negative values)
    pub fn pause_duration(&self) -> Duration {
        Duration::from_millis(self.pause_after_ms.max(0) as u64)
    }
}

/// Ordered chunks from one complete synthesis pass.
///
/// Always non-empty; construction from an empty list fails.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    chunks: Vec<Chunk>,
}

impl SynthesisResult {
    /// Wrap a list of chunks, rejecting an empty list.
    pub fn new(chunks: Vec<Chunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::InvalidInput(
                "synthesis produced no chunks".to_string(),
            ));
        }
        Ok(Self { chunks })
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Borrow the chunks in playback order
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Total sample count across all chunks (ignoring pauses)
    pub fn total_samples(&self) -> usize {
        self.chunks.iter().map(|c| c.samples.len()).sum()
    }
}

impl IntoIterator for SynthesisResult {
    type Item = Chunk;
    type IntoIter = std::vec::IntoIter<Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

/// Stitched, ready-to-encode unit.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A run of mono f32 samples
    Samples(Vec<f32>),

    /// An explicit silence span
    Silence(Duration),
}

impl StreamEvent {
    /// Number of frames this event occupies at the given sample rate
    pub fn frame_count(&self, sample_rate: u32) -> usize {
        match self {
            StreamEvent::Samples(samples) => samples.len(),
            StreamEvent::Silence(duration) => silence_frames(*duration, sample_rate),
        }
    }

    /// True for a silence event
    pub fn is_silence(&self) -> bool {
        matches!(self, StreamEvent::Silence(_))
    }
}

/// Quantized mono PCM buffer ready for a sink.
///
/// Capacity is fixed at construction. Buffers are moved between owners,
/// never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    /// i16 samples (mono)
    samples: Box<[i16]>,

    /// Sample rate in Hz
    sample_rate: u32,
}

impl PcmBuffer {
    /// Channel count is always 1
    pub const CHANNELS: u16 = 1;

    /// Wrap already-quantized samples
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
            sample_rate,
        }
    }

    /// Quantize f32 samples into a new buffer
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        Self::new(samples.iter().map(|&s| quantize_sample(s)).collect(), sample_rate)
    }

    /// Zero-filled buffer of `frames` frames
    pub fn silence(frames: usize, sample_rate: u32) -> Self {
        Self::new(vec![0; frames], sample_rate)
    }

    /// Zero-filled buffer covering `duration`
    pub fn silence_for(duration: Duration, sample_rate: u32) -> Self {
        Self::silence(silence_frames(duration, sample_rate), sample_rate)
    }

    /// Number of frames (equal to samples for mono)
    pub fn frame_count(&self) -> usize {
        self.samples.len()
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count (always 1)
    pub fn channels(&self) -> u16 {
        Self::CHANNELS
    }

    /// True if the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Borrow the quantized samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Get duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    /// Convert back to f32 in [-1.0, 1.0]
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|&s| s as f32 / I16_FULL_SCALE)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_full_scale() {
        assert_eq!(quantize_sample(1.0), 32767);
        assert_eq!(quantize_sample(-1.0), -32767);
        assert_eq!(quantize_sample(0.0), 0);
    }

    #[test]
    fn test_quantize_clamps_out_of_range() {
        assert_eq!(quantize_sample(1.5), 32767);
        assert_eq!(quantize_sample(-7.0), -32767);
    }

    #[test]
    fn test_quantize_truncates_toward_zero() {
        // 0.5 * 32767 = 16383.5
        assert_eq!(quantize_sample(0.5), 16383);
        assert_eq!(quantize_sample(-0.5), -16383);
    }

    #[test]
    fn test_silence_frames_rounding() {
        assert_eq!(silence_frames(Duration::from_millis(50), 1000), 50);
        assert_eq!(silence_frames(Duration::from_millis(250), 24000), 6000);
        // 1ms at 22050 Hz = 22.05 frames
        assert_eq!(silence_frames(Duration::from_millis(1), 22050), 22);
        assert_eq!(silence_frames(Duration::ZERO, 48000), 0);
    }

    #[test]
    fn test_chunk_validate_rejects_negative_pause() {
        let chunk = Chunk::new(vec![0.1, 0.2], -5);
        assert!(matches!(chunk.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_chunk_validate_rejects_nan() {
        let chunk = Chunk::new(vec![0.1, f32::NAN, 0.2], 0);
        let err = chunk.validate().unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn test_chunk_validate_accepts_pause_only() {
        assert!(Chunk::pause(120).validate().is_ok());
        assert_eq!(Chunk::pause(120).pause_duration(), Duration::from_millis(120));
    }

    #[test]
    fn test_synthesis_result_rejects_empty() {
        assert!(SynthesisResult::new(Vec::new()).is_err());

        let result = SynthesisResult::new(vec![Chunk::new(vec![0.0; 10], 0)]).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.total_samples(), 10);
    }

    #[test]
    fn test_stream_event_frame_count() {
        assert_eq!(StreamEvent::Samples(vec![0.0; 42]).frame_count(16000), 42);
        assert_eq!(
            StreamEvent::Silence(Duration::from_millis(10)).frame_count(16000),
            160
        );
    }

    #[test]
    fn test_pcm_buffer_from_f32() {
        let buffer = PcmBuffer::from_f32(&[1.0, -1.0, 0.0, 2.0], 24000);
        assert_eq!(buffer.samples(), &[32767, -32767, 0, 32767]);
        assert_eq!(buffer.frame_count(), 4);
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.sample_rate(), 24000);
    }

    #[test]
    fn test_pcm_buffer_silence_duration() {
        let buffer = PcmBuffer::silence_for(Duration::from_millis(250), 24000);
        assert_eq!(buffer.frame_count(), 6000);
        assert_eq!(buffer.duration_ms(), 250);
        assert!(buffer.samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_pcm_buffer_to_f32() {
        let buffer = PcmBuffer::new(vec![32767, -32767, 0], 8000);
        assert_eq!(buffer.to_f32(), vec![1.0, -1.0, 0.0]);
    }
}
