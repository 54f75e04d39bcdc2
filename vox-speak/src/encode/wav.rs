//! Canonical PCM WAV layout
//!
//! 44-byte header, 16-bit signed little-endian, mono:
//!
//! | Offset | Field            | Value                    |
//! |--------|------------------|--------------------------|
//! | 0      | `RIFF`           |                          |
//! | 4      | RIFF chunk size  | data size + 36           |
//! | 8      | `WAVE` `fmt `    |                          |
//! | 16     | fmt size         | 16                       |
//! | 20     | format tag       | 1 (PCM)                  |
//! | 22     | channels         | 1                        |
//! | 24     | sample rate      |                          |
//! | 28     | byte rate        | sample rate * 2          |
//! | 32     | block align      | 2                        |
//! | 34     | bits per sample  | 16                       |
//! | 36     | `data`           |                          |
//! | 40     | data size        | frames * 2               |

use vox_common::audio::quantize_sample;

/// Size of the canonical header in bytes
pub const HEADER_LEN: usize = 44;

/// File offset of the RIFF chunk size field
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// File offset of the data chunk size field
pub const DATA_SIZE_OFFSET: u64 = 40;

/// Bytes per mono 16-bit frame
pub const BYTES_PER_FRAME: u64 = 2;

/// Header bytes that follow the RIFF size field and precede the data
const RIFF_OVERHEAD: u32 = 36;

const PCM_FORMAT_TAG: u16 = 1;
const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Data chunk size for `frames` frames, saturating at `u32::MAX`.
pub fn data_size(frames: u64) -> u32 {
    u32::try_from(frames.saturating_mul(BYTES_PER_FRAME)).unwrap_or(u32::MAX)
}

/// RIFF chunk size for a data chunk of `data_size` bytes, saturating.
pub fn riff_size(data_size: u32) -> u32 {
    data_size.saturating_add(RIFF_OVERHEAD)
}

/// Build the 44-byte header for `frames` frames at `sample_rate`.
///
/// Pass `frames = 0` for the placeholder written before streaming starts.
pub fn header(sample_rate: u32, frames: u64) -> [u8; HEADER_LEN] {
    let data_len = data_size(frames);
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate.saturating_mul(block_align as u32);

    let mut h = [0u8; HEADER_LEN];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&riff_size(data_len).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    h[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&block_align.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_len.to_le_bytes());
    h
}

/// Quantize `samples` and append them as little-endian i16 to `out`.
pub fn encode_samples(samples: &[f32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * BYTES_PER_FRAME as usize);
    for &sample in samples {
        out.extend_from_slice(&quantize_sample(sample).to_le_bytes());
    }
}
