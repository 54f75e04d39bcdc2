//! End-to-end tests: tone engine through stitcher into each sink

mod helpers;

use helpers::RecordingDevice;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vox_common::config::AudioConfig;
use vox_common::SessionState;
use vox_speak::engine::{SynthesisEngine, ToneEngine, SENTENCE_PAUSE_MS};
use vox_speak::pipeline::{self, render_blocks, render_to_file};
use vox_speak::playback::PlaybackScheduler;
use vox_speak::Error;

const RATE: u32 = 8000;

fn audio() -> AudioConfig {
    AudioConfig {
        sample_rate: RATE,
        ..AudioConfig::default()
    }
}

#[test]
fn test_render_to_file_matches_summary() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.wav");
    let engine = ToneEngine::new(RATE);

    let summary = render_to_file(&engine, "Hello there, world.", "alto", &path, &audio()).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_rate, RATE);
    assert_eq!(reader.len() as u64, summary.total_frames());

    // 120ms comma pause + 250ms closing pause
    let pause_frames = (RATE as u64 * (120 + SENTENCE_PAUSE_MS as u64)) / 1000;
    assert_eq!(summary.silence_frames, pause_frames);
}

#[test]
fn test_render_to_file_unknown_voice() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nobody.wav");
    let engine = ToneEngine::new(RATE);

    let result = render_to_file(&engine, "Hello", "nobody", &path, &audio());
    assert!(matches!(result, Err(Error::Synthesis(_))));
    assert!(!path.exists());
}

#[test]
fn test_render_to_file_without_audio_leaves_no_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("silent.wav");
    let engine = ToneEngine::new(RATE);

    let result = render_to_file(&engine, "  ", "default", &path, &audio());
    assert!(matches!(result, Err(Error::NoAudioProduced)));
    assert!(!path.exists());
}

#[test]
fn test_render_blocks_cover_same_frames_as_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("whole.wav");
    let engine = ToneEngine::new(RATE);
    let text = "One two three four five six seven. Eight, nine";

    let file_summary = render_to_file(&engine, text, "default", &path, &audio()).unwrap();

    let mut block_frames = 0u64;
    let block_summary = render_blocks(&engine, text, "default", &audio(), |_, block| {
        let reader = hound::WavReader::new(std::io::Cursor::new(block)).unwrap();
        block_frames += reader.len() as u64;
        Ok(())
    })
    .unwrap();

    assert_eq!(block_summary, file_summary);
    assert_eq!(block_frames, file_summary.total_frames());
}

#[tokio::test]
async fn test_play_completes_after_all_buffers_render() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), Duration::from_millis(50));

    let renderer = {
        let device = device.clone();
        tokio::spawn(async move {
            loop {
                device.render_all();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    };

    let engine: Arc<dyn SynthesisEngine> = Arc::new(ToneEngine::new(RATE));
    let completion = pipeline::play(engine, "Hello there, world.", "default", &scheduler, &audio())
        .await
        .unwrap();
    renderer.abort();

    // Two clauses, two pauses, one pad
    assert!(!completion.cancelled);
    assert_eq!(completion.rendered_buffers, 5);
    assert_eq!(device.submitted_count(), 5);
    assert_eq!(scheduler.state(), SessionState::Completed);
}

#[tokio::test]
async fn test_play_synthesis_failure_stops_session() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), Duration::from_millis(50));
    let engine: Arc<dyn SynthesisEngine> = Arc::new(ToneEngine::new(RATE));

    let result = pipeline::play(engine, "   ", "default", &scheduler, &audio()).await;

    assert!(matches!(result, Err(Error::NoAudioProduced)));
    assert_eq!(scheduler.state(), SessionState::Idle);
    assert_eq!(device.submitted_count(), 0);
}
