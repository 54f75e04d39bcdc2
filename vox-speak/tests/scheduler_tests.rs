//! Integration tests for the playback scheduler
//!
//! Drive a full session against a RecordingDevice: the test decides when each
//! buffer "renders", which makes completion ordering deterministic.

mod helpers;

use helpers::{wait_until, RecordingDevice, SETTLE};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vox_common::{SessionEvent, SessionState};
use vox_speak::playback::{Completion, PlaybackChunk, PlaybackScheduler};
use vox_speak::Error;

const RATE: u32 = 1000;
const PAD: Duration = Duration::from_millis(250);

/// Records every callback invocation
#[derive(Clone, Default)]
struct CompletionProbe {
    calls: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<Completion>>>,
}

impl CompletionProbe {
    fn callback(&self) -> impl FnOnce(Completion) + Send + 'static {
        let probe = self.clone();
        move |completion| {
            probe.calls.fetch_add(1, Ordering::SeqCst);
            *probe.last.lock().unwrap() = Some(completion);
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last(&self) -> Option<Completion> {
        *self.last.lock().unwrap()
    }
}

fn samples(len: usize) -> PlaybackChunk {
    PlaybackChunk::Samples {
        samples: vec![0.5; len],
        sample_rate: RATE,
    }
}

#[tokio::test]
async fn test_completion_waits_for_trailing_pad() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), PAD);
    let probe = CompletionProbe::default();

    scheduler.start(probe.callback()).unwrap();
    assert_eq!(device.starts(), 1);

    for len in [100, 120, 80] {
        scheduler.enqueue(samples(len)).unwrap();
    }
    scheduler.finish_streaming();
    assert_eq!(scheduler.state(), SessionState::Finishing);

    // Three chunks plus the pad reach the device, in order
    assert!(wait_until(SETTLE, || device.submitted_count() == 4).await);
    assert_eq!(scheduler.pending_buffer_count(), 4);
    assert_eq!(scheduler.queued_buffer_count(), 0);

    let frames: Vec<usize> = device.submitted().iter().map(|b| b.frame_count()).collect();
    assert_eq!(frames, vec![100, 120, 80, 250]);
    assert!(device.submitted()[3].samples().iter().all(|&s| s == 0));

    for remaining in [3, 2, 1] {
        assert!(device.render_next());
        assert!(wait_until(SETTLE, || scheduler.pending_buffer_count() == remaining).await);
        assert_eq!(scheduler.state(), SessionState::Finishing);
        assert_eq!(probe.calls(), 0);
    }

    assert!(device.render_next());
    assert!(wait_until(SETTLE, || probe.calls() == 1).await);
    assert_eq!(scheduler.state(), SessionState::Completed);

    let completion = probe.last().unwrap();
    assert!(!completion.cancelled);
    assert_eq!(completion.rendered_buffers, 4);
    assert_eq!(completion.session_id, scheduler.session_id());
}

#[tokio::test]
async fn test_renders_during_streaming_do_not_complete() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), PAD);
    let probe = CompletionProbe::default();

    scheduler.start(probe.callback()).unwrap();
    scheduler.enqueue(samples(50)).unwrap();
    assert!(wait_until(SETTLE, || device.submitted_count() == 1).await);

    // Queue fully drained while still Playing: no completion
    device.render_all();
    assert!(wait_until(SETTLE, || scheduler.pending_buffer_count() == 0).await);
    assert_eq!(scheduler.state(), SessionState::Playing);
    assert_eq!(probe.calls(), 0);

    scheduler.finish_streaming();
    assert!(wait_until(SETTLE, || device.submitted_count() == 2).await);
    device.render_all();
    assert!(wait_until(SETTLE, || probe.calls() == 1).await);
    assert_eq!(probe.last().unwrap().rendered_buffers, 2);
}

#[tokio::test]
async fn test_stop_cancels_and_ignores_late_renders() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), PAD);
    let probe = CompletionProbe::default();

    scheduler.start(probe.callback()).unwrap();
    for _ in 0..3 {
        scheduler.enqueue(samples(100)).unwrap();
    }
    assert!(wait_until(SETTLE, || device.submitted_count() == 3).await);
    assert!(device.render_next());
    assert!(wait_until(SETTLE, || scheduler.pending_buffer_count() == 2).await);

    // Two buffers are "in hardware" and will still report after the stop
    let late = device.take_tickets();
    assert_eq!(late.len(), 2);

    scheduler.stop();
    assert_eq!(scheduler.state(), SessionState::Idle);
    assert_eq!(scheduler.pending_buffer_count(), 0);
    assert_eq!(scheduler.queued_buffer_count(), 0);
    assert_eq!(probe.calls(), 1);

    let completion = probe.last().unwrap();
    assert!(completion.cancelled);
    assert_eq!(completion.rendered_buffers, 1);

    assert!(wait_until(SETTLE, || device.clears() == 1).await);

    for ticket in late {
        ticket.rendered();
    }
    scheduler.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(probe.calls(), 1);
    assert_eq!(scheduler.state(), SessionState::Idle);
    assert_eq!(scheduler.pending_buffer_count(), 0);
}

#[tokio::test]
async fn test_stale_renders_do_not_touch_next_session() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), PAD);

    let first = scheduler.start(|_| {}).unwrap();
    scheduler.enqueue(samples(10)).unwrap();
    assert!(wait_until(SETTLE, || device.submitted_count() == 1).await);
    let late = device.take_tickets();
    scheduler.stop();

    let probe = CompletionProbe::default();
    let second = scheduler.start(probe.callback()).unwrap();
    assert_ne!(first, second);

    scheduler.enqueue(samples(10)).unwrap();
    assert!(wait_until(SETTLE, || device.submitted_count() == 2).await);
    assert_eq!(scheduler.pending_buffer_count(), 1);

    for ticket in late {
        assert_eq!(ticket.session_id(), first);
        ticket.rendered();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(scheduler.pending_buffer_count(), 1);
    assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn test_decode_failure_drops_only_that_chunk() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), PAD);
    let mut events = scheduler.subscribe();
    let probe = CompletionProbe::default();

    let session_id = scheduler.start(probe.callback()).unwrap();
    scheduler.enqueue(samples(40)).unwrap();

    let result = scheduler.enqueue(PlaybackChunk::Wav(b"RIFF garbage".to_vec()));
    assert!(matches!(result, Err(Error::Decode(_))));
    assert_eq!(scheduler.state(), SessionState::Playing);

    scheduler.enqueue(samples(60)).unwrap();
    scheduler.finish_streaming();

    assert!(wait_until(SETTLE, || device.submitted_count() == 3).await);
    let frames: Vec<usize> = device.submitted().iter().map(|b| b.frame_count()).collect();
    assert_eq!(frames, vec![40, 60, 250]);

    device.render_all();
    assert!(wait_until(SETTLE, || probe.calls() == 1).await);
    assert!(!probe.last().unwrap().cancelled);

    let mut dropped = 0;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::BufferDropped { session_id: id, .. } = event {
            assert_eq!(id, session_id);
            dropped += 1;
        }
    }
    assert_eq!(dropped, 1);
}

#[tokio::test]
async fn test_enqueue_outside_playing_is_noop() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), PAD);

    scheduler.enqueue(samples(10)).unwrap();
    assert_eq!(scheduler.state(), SessionState::Idle);
    assert_eq!(scheduler.queued_buffer_count(), 0);

    scheduler.start(|_| {}).unwrap();
    scheduler.finish_streaming();
    scheduler.enqueue(samples(10)).unwrap();

    assert!(wait_until(SETTLE, || device.submitted_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Only the pad
    assert_eq!(device.submitted_count(), 1);
    assert_eq!(device.submitted()[0].frame_count(), 250);
}

#[tokio::test]
async fn test_device_start_failure_leaves_idle() {
    let device = RecordingDevice::failing(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), PAD);
    let probe = CompletionProbe::default();

    let result = scheduler.start(probe.callback());
    assert!(matches!(result, Err(Error::Device(_))));
    assert_eq!(scheduler.state(), SessionState::Idle);
    assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn test_chunks_resampled_to_device_rate() {
    let device = RecordingDevice::new(48000);
    let scheduler = PlaybackScheduler::new(device.clone(), Duration::from_millis(10));

    scheduler.start(|_| {}).unwrap();
    scheduler
        .enqueue(PlaybackChunk::Samples {
            samples: vec![0.25; 160],
            sample_rate: 16000,
        })
        .unwrap();
    scheduler.finish_streaming();

    assert!(wait_until(SETTLE, || device.submitted_count() == 2).await);
    let submitted = device.submitted();
    assert_eq!(submitted[0].frame_count(), 480);
    assert_eq!(submitted[0].sample_rate(), 48000);
    assert_eq!(submitted[1].frame_count(), 480);
}

#[tokio::test]
async fn test_state_events_in_order() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), PAD);
    let mut events = scheduler.subscribe();
    let probe = CompletionProbe::default();

    scheduler.start(probe.callback()).unwrap();
    scheduler.enqueue(samples(10)).unwrap();
    scheduler.finish_streaming();
    assert!(wait_until(SETTLE, || device.submitted_count() == 2).await);
    device.render_all();
    assert!(wait_until(SETTLE, || probe.calls() == 1).await);

    let mut states = Vec::new();
    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::StateChanged { state, .. } => states.push(state),
            SessionEvent::Completed { cancelled, .. } => {
                assert!(!cancelled);
                completed += 1;
            }
            SessionEvent::BufferDropped { .. } => panic!("unexpected drop"),
        }
    }
    assert_eq!(
        states,
        vec![
            SessionState::Playing,
            SessionState::Finishing,
            SessionState::Completed
        ]
    );
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_new_session_after_completion() {
    let device = RecordingDevice::new(RATE);
    let scheduler = PlaybackScheduler::new(device.clone(), Duration::ZERO);
    let first = CompletionProbe::default();

    scheduler.start(first.callback()).unwrap();
    scheduler.finish_streaming();
    assert!(wait_until(SETTLE, || first.calls() == 1).await);
    assert_eq!(first.last().unwrap().rendered_buffers, 0);
    assert_eq!(scheduler.state(), SessionState::Completed);

    let second = CompletionProbe::default();
    scheduler.start(second.callback()).unwrap();
    assert_eq!(scheduler.state(), SessionState::Playing);
    scheduler.stop();
    assert_eq!(second.calls(), 1);
    assert_eq!(first.calls(), 1);
}
