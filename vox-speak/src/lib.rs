//! # Vox Speech Streamer (vox-speak)
//!
//! Streams synthesized speech, chunk by chunk, to a WAV file or a live audio
//! device without holding the whole utterance in memory.
//!
//! **Architecture:** synthesis engine → chunk stitcher → {WAV stream writer |
//! block encoder | playback scheduler (rubato + cpal)}

pub mod encode;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod stitch;

pub use error::{Error, Result};
pub use stitch::ChunkStitcher;
