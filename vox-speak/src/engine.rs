//! Synthesis engine boundary
//!
//! The pipeline consumes any [`SynthesisEngine`]. [`ToneEngine`] is the
//! built-in implementation: it renders each word as a short enveloped tone so
//! the rest of the system can be driven end to end without a neural model.

use crate::error::{Error, Result};
use std::f32::consts::TAU;
use tracing::debug;
use vox_common::{Chunk, SynthesisResult};

/// Text-to-audio engine.
///
/// `synthesize` is blocking; async callers should run it on a blocking
/// thread.
pub trait SynthesisEngine: Send + Sync {
    /// Rate of every chunk this engine produces
    fn sample_rate(&self) -> u32;

    /// Voice ids accepted by `synthesize`
    fn voices(&self) -> Vec<String>;

    /// Synthesize `text` with `voice_id`.
    ///
    /// # Errors
    /// - `NoAudioProduced` if the engine produced no chunks
    /// - `Synthesis` for engine-specific failures (unknown voice, ...)
    fn synthesize(&self, text: &str, voice_id: &str) -> Result<SynthesisResult>;
}

/// Wrap engine output, treating an empty chunk list as a failure
pub fn into_result(chunks: Vec<Chunk>) -> Result<SynthesisResult> {
    if chunks.is_empty() {
        return Err(Error::NoAudioProduced);
    }
    Ok(SynthesisResult::new(chunks)?)
}

/// Pause after sentence-ending punctuation
pub const SENTENCE_PAUSE_MS: i64 = 250;

/// Pause after clause-separating punctuation
pub const CLAUSE_PAUSE_MS: i64 = 120;

/// Longest run of words rendered as one chunk
const MAX_WORDS_PER_CHUNK: usize = 6;

const WORD_MS: u32 = 160;
const ENVELOPE_MS: u32 = 10;
const AMPLITUDE: f32 = 0.3;

const VOICES: &[(&str, f32)] = &[
    ("bass", 110.0),
    ("tenor", 165.0),
    ("default", 200.0),
    ("alto", 220.0),
    ("soprano", 330.0),
];

/// Pause authored by a clause's closing punctuation
fn pause_for(terminator: Option<char>) -> i64 {
    match terminator {
        Some('.' | '!' | '?') => SENTENCE_PAUSE_MS,
        Some(',' | ';' | ':') => CLAUSE_PAUSE_MS,
        _ => 0,
    }
}

/// Split text into `(words, pause_after_ms)` groups.
fn segment(text: &str) -> Vec<(Vec<&str>, i64)> {
    let mut groups = Vec::new();
    let mut start = 0;

    for (index, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | ',' | ';' | ':') {
            push_clause(&mut groups, &text[start..index], pause_for(Some(c)));
            start = index + c.len_utf8();
        }
    }
    push_clause(&mut groups, &text[start..], pause_for(None));

    groups
}

fn push_clause<'a>(groups: &mut Vec<(Vec<&'a str>, i64)>, clause: &'a str, pause_ms: i64) {
    let words: Vec<&str> = clause.split_whitespace().collect();
    if words.is_empty() {
        // Punctuation with no words ("...") still lengthens the preceding pause
        if let Some(last) = groups.last_mut() {
            last.1 = last.1.max(pause_ms);
        }
        return;
    }

    let mut runs = words.chunks(MAX_WORDS_PER_CHUNK).peekable();
    while let Some(run) = runs.next() {
        let pause = if runs.peek().is_none() { pause_ms } else { 0 };
        groups.push((run.to_vec(), pause));
    }
}

/// Deterministic tone synthesizer
#[derive(Debug, Clone)]
pub struct ToneEngine {
    sample_rate: u32,
}

impl ToneEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    fn render_words(&self, words: &[&str], base_hz: f32) -> Vec<f32> {
        let word_frames = (self.sample_rate as u64 * WORD_MS as u64 / 1000) as usize;
        let envelope_frames = (self.sample_rate as u64 * ENVELOPE_MS as u64 / 1000).max(1) as usize;
        let mut samples = Vec::with_capacity(word_frames * words.len());

        for word in words {
            // Small pitch step per word so consecutive words are distinguishable
            let step = (word.chars().count() % 4) as f32;
            let freq = base_hz * (1.0 + 0.06 * step);

            for i in 0..word_frames {
                let phase = TAU * freq * i as f32 / self.sample_rate as f32;
                let attack = (i as f32 / envelope_frames as f32).min(1.0);
                let decay = ((word_frames - i) as f32 / envelope_frames as f32).min(1.0);
                samples.push(AMPLITUDE * attack * decay * phase.sin());
            }
        }
        samples
    }
}

impl SynthesisEngine for ToneEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn voices(&self) -> Vec<String> {
        VOICES.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn synthesize(&self, text: &str, voice_id: &str) -> Result<SynthesisResult> {
        let base_hz = VOICES
            .iter()
            .find(|(name, _)| *name == voice_id)
            .map(|(_, hz)| *hz)
            .ok_or_else(|| Error::Synthesis(format!("unknown voice '{}'", voice_id)))?;

        let chunks: Vec<Chunk> = segment(text)
            .into_iter()
            .map(|(words, pause_ms)| Chunk::new(self.render_words(&words, base_hz), pause_ms))
            .collect();

        debug!(
            "Synthesized {} chunks for {} chars with voice '{}'",
            chunks.len(),
            text.len(),
            voice_id
        );
        into_result(chunks)
    }
}
