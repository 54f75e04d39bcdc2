//! # Vox Common Library
//!
//! Shared code for the Vox speech streaming crates including:
//! - The audio data contract (chunks, stream events, PCM buffers)
//! - Playback session events (SessionEvent enum)
//! - Bootstrap configuration loading
//! - Common error type

pub mod audio;
pub mod config;
pub mod error;
pub mod events;

pub use audio::{Chunk, PcmBuffer, StreamEvent, SynthesisResult};
pub use error::{Error, Result};
pub use events::{SessionEvent, SessionState};
