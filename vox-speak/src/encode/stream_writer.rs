//! Incremental WAV file writer
//!
//! Writes a placeholder header on open, appends PCM as events arrive, and
//! patches the two size fields on finish. Until finish runs the file is
//! still a playable WAV (readers treat the zero data size as "to end of
//! file" or as empty, never as corrupt).
//!
//! Finish is idempotent and also runs on drop, so an early return or a
//! panic in the caller still leaves a parseable file behind.

use crate::encode::wav::{self, DATA_SIZE_OFFSET, RIFF_SIZE_OFFSET};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};
use vox_common::audio::silence_frames;
use vox_common::StreamEvent;

/// Frames converted per write call; bounds the scratch buffer size
const WRITE_BLOCK_FRAMES: usize = 4096;

/// Streaming WAV writer over any seekable destination.
pub struct WavStreamWriter<W: Write + Seek = BufWriter<File>> {
    /// Destination; `None` once closed
    inner: Option<W>,

    /// Sample rate written into the header
    sample_rate: u32,

    /// Frames known to be on the destination
    total_samples_written: u64,

    /// Reused conversion buffer
    scratch: Vec<u8>,
}

impl WavStreamWriter<BufWriter<File>> {
    /// Create (or truncate) a WAV file at `path` and write its placeholder header.
    ///
    /// # Errors
    /// - `InvalidDestination` if the path is empty, names a directory, or its
    ///   parent directory does not exist (nothing is created in that case)
    /// - `EncodingIo` if the file cannot be created or the header written
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        validate_destination(path)?;

        let file = File::create(path)?;
        debug!("Opened WAV stream {} at {}Hz", path.display(), sample_rate);
        Self::new(BufWriter::new(file), sample_rate)
    }
}

impl<W: Write + Seek> WavStreamWriter<W> {
    /// Wrap a destination and write the placeholder header.
    pub fn new(mut inner: W, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }
        inner.write_all(&wav::header(sample_rate, 0))?;

        Ok(Self {
            inner: Some(inner),
            sample_rate,
            total_samples_written: 0,
            scratch: Vec::with_capacity(WRITE_BLOCK_FRAMES * 2),
        })
    }

    /// Sample rate in the header
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames appended so far
    pub fn total_samples_written(&self) -> u64 {
        self.total_samples_written
    }

    /// True once finish has run
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Quantize and append a batch of samples.
    ///
    /// # Errors
    /// `EncodingIo` if the destination rejects the write. The stream is then
    /// closed with its header describing the frames appended before the
    /// failed batch, and every later append fails with `InvalidState`.
    pub fn append(&mut self, samples: &[f32]) -> Result<()> {
        let inner = self.inner.as_mut().ok_or_else(closed_error)?;
        let scratch = &mut self.scratch;

        let written = samples
            .chunks(WRITE_BLOCK_FRAMES)
            .try_for_each(|block| {
                scratch.clear();
                wav::encode_samples(block, scratch);
                inner.write_all(scratch)
            })
            .and_then(|()| inner.flush());
        self.commit(written, samples.len())
    }

    /// Append `frames` frames of digital silence.
    ///
    /// Fails the same way as [`append`](Self::append).
    pub fn append_silence(&mut self, frames: usize) -> Result<()> {
        let inner = self.inner.as_mut().ok_or_else(closed_error)?;
        let scratch = &mut self.scratch;

        let mut remaining = frames;
        let mut written = Ok(());
        while remaining > 0 && written.is_ok() {
            let block = remaining.min(WRITE_BLOCK_FRAMES);
            scratch.clear();
            scratch.resize(block * 2, 0);
            written = inner.write_all(scratch);
            remaining -= block;
        }
        let written = written.and_then(|()| inner.flush());
        self.commit(written, frames)
    }

    /// Count a batch once it is known to be on the destination, or abort.
    fn commit(&mut self, written: io::Result<()>, frames: usize) -> Result<()> {
        match written {
            Ok(()) => {
                self.total_samples_written += frames as u64;
                Ok(())
            }
            Err(e) => {
                error!(
                    "WAV stream write failed after {} frames: {}",
                    self.total_samples_written, e
                );
                self.abort();
                Err(e.into())
            }
        }
    }

    /// Close after a failed write. Bytes of the failed batch may trail the
    /// data chunk; the header excludes them.
    fn abort(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            if let Err(e) = patch_header(&mut inner, self.total_samples_written) {
                error!("Failed to finalize WAV stream after write error: {}", e);
            }
        }
    }

    /// Append `duration` of silence at the writer's sample rate.
    pub fn append_silence_for(&mut self, duration: Duration) -> Result<()> {
        self.append_silence(silence_frames(duration, self.sample_rate))
    }

    /// Append one stitched event.
    ///
    /// # Returns
    /// Frames written for this event
    pub fn write_event(&mut self, event: &StreamEvent) -> Result<usize> {
        match event {
            StreamEvent::Samples(samples) => {
                self.append(samples)?;
                Ok(samples.len())
            }
            StreamEvent::Silence(duration) => {
                let frames = silence_frames(*duration, self.sample_rate);
                self.append_silence(frames)?;
                Ok(frames)
            }
        }
    }

    /// Patch the header sizes and close the destination.
    ///
    /// Calling it again is a no-op. Size fields saturate at `u32::MAX` for
    /// streams longer than a WAV file can describe.
    pub fn finish(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(mut inner) => {
                patch_header(&mut inner, self.total_samples_written)?;
                debug!(
                    "Finalized WAV stream: {} frames ({} data bytes)",
                    self.total_samples_written,
                    wav::data_size(self.total_samples_written)
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Finish and hand back the destination (useful for in-memory writers).
    pub fn into_inner(mut self) -> Result<W> {
        let mut inner = self.inner.take().ok_or_else(closed_error)?;
        patch_header(&mut inner, self.total_samples_written)?;
        Ok(inner)
    }
}

impl<W: Write + Seek> Drop for WavStreamWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!("Failed to finalize WAV stream on drop: {}", e);
        }
    }
}

fn patch_header<W: Write + Seek>(inner: &mut W, frames: u64) -> Result<()> {
    let data_len = wav::data_size(frames);

    inner.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
    inner.write_all(&wav::riff_size(data_len).to_le_bytes())?;
    inner.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
    inner.write_all(&data_len.to_le_bytes())?;
    inner.seek(SeekFrom::End(0))?;
    inner.flush()?;
    Ok(())
}

fn closed_error() -> Error {
    Error::InvalidState("WAV stream already finished".to_string())
}

fn validate_destination(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidDestination("empty path".to_string()));
    }
    if path.is_dir() {
        return Err(Error::InvalidDestination(format!(
            "{} is a directory",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(Error::InvalidDestination(format!(
                "parent directory {} does not exist",
                parent.display()
            )));
        }
    }
    Ok(())
}
