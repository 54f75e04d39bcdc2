//! Error types for vox-speak
//!
//! Stitching and encoding errors abort the current operation and propagate to
//! the caller. Decode errors on the playback path are reported per chunk and
//! never end a session.

use thiserror::Error;

/// Main error type for vox-speak
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed chunk from the synthesis engine (NaN samples, negative pause)
    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    /// Synthesis finished without producing any chunk
    #[error("Synthesis produced no audio")]
    NoAudioProduced,

    /// Synthesis engine rejected the request or failed internally
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Destination write/seek failure
    #[error("Encoding I/O error: {0}")]
    EncodingIo(#[from] std::io::Error),

    /// Destination path cannot hold a WAV file
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// A playback chunk could not be decoded or converted
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    Device(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<vox_common::Error> for Error {
    fn from(err: vox_common::Error) -> Self {
        match err {
            vox_common::Error::Io(e) => Error::EncodingIo(e),
            vox_common::Error::Config(msg) => Error::Config(msg),
            vox_common::Error::InvalidInput(msg) => Error::InvalidChunk(msg),
        }
    }
}

/// Convenience Result type using vox-speak Error
pub type Result<T> = std::result::Result<T, Error>;
