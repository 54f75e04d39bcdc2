//! Chunk stitching
//!
//! Turns the engine's chunk sequence into a flat sequence of stream events,
//! crossfading acoustically adjacent chunks and turning authored pauses into
//! explicit silence.
//!
//! # Boundary Rules
//!
//! - **Pause after chunk**: emit the chunk verbatim, then `Silence(pause)`.
//!   Audio is never faded across an authored pause.
//! - **No pause**: the two chunks were synthesized independently but are
//!   meant to be heard back to back. The tail of the first and the head of the
//!   second are linearly blended over the crossfade window; the blended head
//!   samples are removed from the second chunk.
//! - **Empty chunk with pause**: pure silence, one `Silence` event.
//!
//! The stitcher holds at most one chunk (the pending one) and hands it to the
//! caller by value when it is emitted.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::trace;
use vox_common::{Chunk, StreamEvent};

/// Crossfade window in samples for a sample rate and window length
pub fn crossfade_window_samples(sample_rate: u32, crossfade_ms: u32) -> usize {
    (sample_rate as u64 * crossfade_ms as u64 / 1000) as usize
}

/// Linearly crossfade the tail of `previous` with the head of `next`.
///
/// Overwrites the last `n` samples of `previous` with the blend and removes
/// the first `n` samples from `next`, where
/// `n = min(window, previous.len(), next.len())`.
///
/// # Returns
/// The number of blended samples `n`
pub fn crossfade(previous: &mut [f32], next: &mut Vec<f32>, window: usize) -> usize {
    let fade_count = window.min(previous.len()).min(next.len());
    if fade_count == 0 {
        return 0;
    }

    let tail_start = previous.len() - fade_count;
    let span = (fade_count - 1) as f32;

    for (i, (out, &incoming)) in previous[tail_start..]
        .iter_mut()
        .zip(next.iter())
        .enumerate()
    {
        let t = if fade_count == 1 { 1.0 } else { i as f32 / span };
        *out = *out * (1.0 - t) + incoming * t;
    }

    next.drain(..fade_count);
    fade_count
}

/// Stateful chunk stitcher.
///
/// Feed chunks in playback order with [`push`](Self::push), then call
/// [`finish`](Self::finish) once the engine is exhausted.
#[derive(Debug)]
pub struct ChunkStitcher {
    /// Crossfade window in samples
    window: usize,

    /// Chunk waiting for its right-hand neighbour (never empty)
    pending: Option<Vec<f32>>,

    /// Pause following the pending chunk (or an outstanding bare pause)
    pending_pause_ms: u64,
}

impl ChunkStitcher {
    /// Create a stitcher with a crossfade window expressed in samples
    pub fn new(window: usize) -> Self {
        Self {
            window,
            pending: None,
            pending_pause_ms: 0,
        }
    }

    /// Create a stitcher with a window of `crossfade_ms` at `sample_rate`
    pub fn with_crossfade(sample_rate: u32, crossfade_ms: u32) -> Self {
        Self::new(crossfade_window_samples(sample_rate, crossfade_ms))
    }

    /// Crossfade window in samples
    pub fn window(&self) -> usize {
        self.window
    }

    /// True if nothing is held back (no pending chunk or pause)
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && self.pending_pause_ms == 0
    }

    /// Consume one chunk and return the events that became ready.
    ///
    /// # Errors
    /// `InvalidChunk` for negative pauses or non-finite samples. The stitcher
    /// state is left untouched on error.
    pub fn push(&mut self, chunk: Chunk) -> Result<Vec<StreamEvent>> {
        chunk
            .validate()
            .map_err(|e| Error::InvalidChunk(e.to_string()))?;

        let pause_ms = chunk.pause_after_ms as u64;
        let mut current = chunk.samples;
        let mut events = Vec::with_capacity(3);

        // A bare pause is outstanding (sequence began with silence)
        if self.pending.is_none() {
            self.take_pause_into(&mut events);
        }

        if let Some(mut previous) = self.pending.take() {
            if self.pending_pause_ms > 0 {
                events.push(StreamEvent::Samples(previous));
                self.take_pause_into(&mut events);
            } else {
                let faded = crossfade(&mut previous, &mut current, self.window);
                trace!(faded, remaining = current.len(), "crossfaded adjacent chunks");
                events.push(StreamEvent::Samples(previous));
            }
        }

        self.pending = if current.is_empty() { None } else { Some(current) };
        self.pending_pause_ms = pause_ms;

        // A chunk with no samples but a pause is pure silence
        if self.pending.is_none() {
            self.take_pause_into(&mut events);
        }

        Ok(events)
    }

    /// Flush whatever is held back once the input is exhausted.
    ///
    /// Leaves the stitcher idle and ready for a new sequence.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::with_capacity(2);
        if let Some(previous) = self.pending.take() {
            events.push(StreamEvent::Samples(previous));
        }
        self.take_pause_into(&mut events);
        events
    }

    /// Emit the outstanding pause, if any, and clear it.
    ///
    /// Every silence the stitcher produces goes through here, so a leading
    /// pause and a zero-sample chunk yield identical durations.
    fn take_pause_into(&mut self, events: &mut Vec<StreamEvent>) {
        let pause_ms = std::mem::take(&mut self.pending_pause_ms);
        if pause_ms > 0 {
            events.push(StreamEvent::Silence(Duration::from_millis(pause_ms)));
        }
    }
}

/// Iterator adapter that stitches a chunk iterator lazily.
///
/// Yields `Err` at most once, then ends.
pub struct Stitched<I> {
    chunks: I,
    stitcher: ChunkStitcher,
    ready: VecDeque<StreamEvent>,
    done: bool,
}

impl<I> Iterator for Stitched<I>
where
    I: Iterator<Item = Chunk>,
{
    type Item = Result<StreamEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }

            match self.chunks.next() {
                Some(chunk) => match self.stitcher.push(chunk) {
                    Ok(events) => self.ready.extend(events),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
                None => {
                    self.done = true;
                    self.ready.extend(self.stitcher.finish());
                }
            }
        }
    }
}

/// Stitch `chunks` with a crossfade window of `window` samples.
pub fn stitch<I>(chunks: I, window: usize) -> Stitched<I::IntoIter>
where
    I: IntoIterator<Item = Chunk>,
{
    Stitched {
        chunks: chunks.into_iter(),
        stitcher: ChunkStitcher::new(window),
        ready: VecDeque::new(),
        done: false,
    }
}
