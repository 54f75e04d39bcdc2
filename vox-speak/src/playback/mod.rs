//! Live playback
//!
//! Chunks flow producer → [`PlaybackScheduler`] (decode, resample, queue) →
//! [`OutputDevice`] (render) → render notices back to the scheduler task.
//! Session state transitions live in [`state`] as a pure function.

pub mod cpal_output;
pub mod decode;
pub mod output;
pub mod resampler;
pub mod scheduler;
pub mod state;

pub use cpal_output::CpalOutput;
pub use decode::PlaybackChunk;
pub use output::{OutputDevice, RenderTicket};
pub use resampler::Resampler;
pub use scheduler::{Completion, PlaybackScheduler};
