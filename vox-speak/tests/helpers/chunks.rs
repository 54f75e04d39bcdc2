//! Chunk builders

use vox_common::Chunk;

/// Constant-amplitude chunk of `len` samples
pub fn tone(len: usize, level: f32, pause_after_ms: i64) -> Chunk {
    Chunk::new(vec![level; len], pause_after_ms)
}

/// Chunk whose samples rise linearly from 0.0 toward 1.0
pub fn ramp(len: usize, pause_after_ms: i64) -> Chunk {
    let samples = (0..len).map(|i| i as f32 / len.max(1) as f32).collect();
    Chunk::new(samples, pause_after_ms)
}
