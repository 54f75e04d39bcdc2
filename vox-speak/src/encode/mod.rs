//! PCM encoding of stream events
//!
//! Two sinks share one quantization rule (see [`vox_common::audio::quantize_sample`]):
//! - [`WavStreamWriter`]: appends to a growable WAV file whose header sizes
//!   are patched once on finish
//! - [`BlockEncoder`]: one self-contained WAV document per event

pub mod blocks;
pub mod stream_writer;
pub mod wav;

pub use blocks::BlockEncoder;
pub use stream_writer::WavStreamWriter;
