//! End-to-end rendering
//!
//! engine → [`ChunkStitcher`] → one of three sinks:
//! - [`render_to_file`]: a streaming WAV file
//! - [`render_blocks`]: one WAV document per event
//! - [`play`]: the live [`PlaybackScheduler`]

use crate::encode::{BlockEncoder, WavStreamWriter};
use crate::engine::SynthesisEngine;
use crate::error::{Error, Result};
use crate::playback::{Completion, PlaybackChunk, PlaybackScheduler};
use crate::stitch::ChunkStitcher;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use vox_common::config::AudioConfig;
use vox_common::{StreamEvent, SynthesisResult};

/// What a render produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub sample_rate: u32,
    pub events: usize,
    pub sample_frames: u64,
    pub silence_frames: u64,
}

impl RenderSummary {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            events: 0,
            sample_frames: 0,
            silence_frames: 0,
        }
    }

    fn record(&mut self, event: &StreamEvent) {
        self.events += 1;
        let frames = event.frame_count(self.sample_rate) as u64;
        if event.is_silence() {
            self.silence_frames += frames;
        } else {
            self.sample_frames += frames;
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.sample_frames + self.silence_frames
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_frames() as f64 / self.sample_rate as f64)
    }
}

/// Synthesize `text` and feed each stitched event to `sink` in order.
///
/// Stops at the first stitching or sink error.
pub fn stitch_events<F>(
    engine: &dyn SynthesisEngine,
    text: &str,
    voice_id: &str,
    crossfade_ms: u32,
    sink: F,
) -> Result<RenderSummary>
where
    F: FnMut(StreamEvent) -> Result<()>,
{
    let result = engine.synthesize(text, voice_id)?;
    stitch_result(result, engine.sample_rate(), crossfade_ms, sink)
}

fn stitch_result<F>(
    result: SynthesisResult,
    sample_rate: u32,
    crossfade_ms: u32,
    mut sink: F,
) -> Result<RenderSummary>
where
    F: FnMut(StreamEvent) -> Result<()>,
{
    let mut stitcher = ChunkStitcher::with_crossfade(sample_rate, crossfade_ms);
    let mut summary = RenderSummary::new(sample_rate);

    debug!(
        "Stitching {} chunks at {}Hz (window {} samples)",
        result.len(),
        sample_rate,
        stitcher.window()
    );

    for chunk in result {
        for event in stitcher.push(chunk)? {
            summary.record(&event);
            sink(event)?;
        }
    }
    for event in stitcher.finish() {
        summary.record(&event);
        sink(event)?;
    }

    Ok(summary)
}

/// Render `text` to a WAV file at `path`.
///
/// The file is finalized even when rendering fails part way; it then holds
/// everything written up to the failure.
pub fn render_to_file(
    engine: &dyn SynthesisEngine,
    text: &str,
    voice_id: &str,
    path: &Path,
    audio: &AudioConfig,
) -> Result<RenderSummary> {
    // Nothing touches `path` unless synthesis produced audio
    let result = engine.synthesize(text, voice_id)?;
    let sample_rate = engine.sample_rate();
    let mut writer = WavStreamWriter::create(path, sample_rate)?;

    let summary = stitch_result(result, sample_rate, audio.crossfade_ms, |event| {
        writer.write_event(&event).map(|_| ())
    })?;
    writer.finish()?;

    info!(
        "Rendered {} frames ({:.2}s) to {}",
        summary.total_frames(),
        summary.duration().as_secs_f64(),
        path.display()
    );
    Ok(summary)
}

/// Render `text` as a series of self-contained WAV documents.
///
/// `on_block` receives a running index and the encoded bytes. Empty events
/// produce no block.
pub fn render_blocks<F>(
    engine: &dyn SynthesisEngine,
    text: &str,
    voice_id: &str,
    audio: &AudioConfig,
    mut on_block: F,
) -> Result<RenderSummary>
where
    F: FnMut(usize, Vec<u8>) -> Result<()>,
{
    let encoder = BlockEncoder::new(engine.sample_rate());
    let mut index = 0;

    stitch_events(engine, text, voice_id, audio.crossfade_ms, |event| {
        let block = encoder.encode_event(&event);
        if block.is_empty() {
            return Ok(());
        }
        on_block(index, block)?;
        index += 1;
        Ok(())
    })
}

/// Speak `text` through `scheduler` and wait for playback to finish.
///
/// Synthesis and stitching run on a blocking thread while events are
/// enqueued as they arrive. A chunk that fails to decode is skipped. A
/// synthesis or stitching failure stops the session and is returned.
pub async fn play(
    engine: Arc<dyn SynthesisEngine>,
    text: &str,
    voice_id: &str,
    scheduler: &PlaybackScheduler,
    audio: &AudioConfig,
) -> Result<Completion> {
    let (done_tx, done_rx) = oneshot::channel();
    let session_id = scheduler.start(move |completion| {
        let _ = done_tx.send(completion);
    })?;

    let sample_rate = engine.sample_rate();
    let crossfade_ms = audio.crossfade_ms;
    let text = text.to_string();
    let voice_id = voice_id.to_string();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let producer = tokio::task::spawn_blocking(move || {
        stitch_events(engine.as_ref(), &text, &voice_id, crossfade_ms, |event| {
            event_tx
                .send(event)
                .map_err(|_| Error::InvalidState("playback consumer went away".to_string()))
        })
    });

    while let Some(event) = event_rx.recv().await {
        if let Err(e) = scheduler.enqueue(PlaybackChunk::from_event(event, sample_rate)) {
            warn!(%session_id, "Skipping chunk: {}", e);
        }
    }

    let summary = match producer.await {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            scheduler.stop();
            return Err(e);
        }
        Err(e) => {
            scheduler.stop();
            return Err(Error::Synthesis(format!("synthesis task failed: {}", e)));
        }
    };

    debug!(
        %session_id,
        events = summary.events,
        frames = summary.total_frames(),
        "All chunks enqueued"
    );
    scheduler.finish_streaming();

    done_rx
        .await
        .map_err(|_| Error::InvalidState("session ended without completion".to_string()))
}
