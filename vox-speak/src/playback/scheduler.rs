//! Playback buffer scheduler
//!
//! Producers call [`PlaybackScheduler::enqueue`] from any context. Decoded
//! buffers land in a queue behind one mutex; a single background task moves
//! them out of the queue and submits them to the [`OutputDevice`], and the
//! same task receives the device's render notices. Because only that task
//! talks to the device, buffers reach it in exactly the order they were
//! queued, and a stop is serialized behind any submission already in flight.
//!
//! **Locking rules:**
//! - Queue, pending count and session state change only under `shared`
//! - Device submission and user callbacks run with the lock released
//! - The completion callback is taken out of `shared` before it is invoked,
//!   so it can run at most once per session

use crate::error::{Error, Result};
use crate::playback::decode::PlaybackChunk;
use crate::playback::output::{OutputDevice, RenderTicket, RenderedNotice};
use crate::playback::state::{transition, Effect, Input, Transition};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;
use vox_common::config::AudioConfig;
use vox_common::{PcmBuffer, SessionEvent, SessionState};

/// Capacity of the session event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Final report for one session, passed to the completion callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub session_id: Uuid,

    /// Buffers the device reported rendered (trailing pad included)
    pub rendered_buffers: u64,

    /// True when the session ended through [`PlaybackScheduler::stop`]
    pub cancelled: bool,
}

type CompletionCallback = Box<dyn FnOnce(Completion) + Send + 'static>;

/// Work for the state-owning task
#[derive(Debug)]
enum Message {
    /// Submit everything queued for this session
    Drain { session_id: Uuid },
    /// Session was stopped; discard what the device still holds
    Halt { session_id: Uuid },
}

struct Shared {
    state: SessionState,
    session_id: Uuid,
    queue: VecDeque<PcmBuffer>,
    /// Submitted to the device, not yet reported rendered
    pending: usize,
    rendered: u64,
    on_complete: Option<CompletionCallback>,
}

impl Shared {
    fn outstanding(&self) -> usize {
        self.pending + self.queue.len()
    }

    fn is_active(&self, session_id: Uuid) -> bool {
        self.session_id == session_id
            && matches!(self.state, SessionState::Playing | SessionState::Finishing)
    }
}

/// Actions deferred until the lock is released
#[derive(Default)]
struct Outcome {
    state_changed: Option<(Uuid, SessionState)>,
    drain: Option<Uuid>,
    halt: Option<Uuid>,
    completion: Option<(CompletionCallback, Completion)>,
}

struct Core {
    device: Arc<dyn OutputDevice>,
    shared: Mutex<Shared>,
    events: broadcast::Sender<SessionEvent>,
    control_tx: mpsc::UnboundedSender<Message>,
    render_tx: mpsc::UnboundedSender<RenderedNotice>,
    trailing_pad: Duration,
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commit a transition and carry out its effects that need the lock.
    fn apply(&self, shared: &mut Shared, t: Transition) -> Outcome {
        let previous = shared.state;
        let mut outcome = Outcome::default();

        for effect in t.effects {
            match effect {
                Effect::ResetCounters => {
                    shared.session_id = Uuid::new_v4();
                    shared.queue.clear();
                    shared.pending = 0;
                    shared.rendered = 0;
                    shared.on_complete = None;
                }
                Effect::AppendTrailingPad => {
                    let pad = PcmBuffer::silence_for(self.trailing_pad, self.device.sample_rate());
                    if !pad.is_empty() {
                        shared.queue.push_back(pad);
                    }
                }
                Effect::ScheduleDrain => outcome.drain = Some(shared.session_id),
                Effect::ClearQueue => {
                    shared.queue.clear();
                    shared.pending = 0;
                    outcome.halt = Some(shared.session_id);
                }
                Effect::NotifyComplete { cancelled } => {
                    if let Some(callback) = shared.on_complete.take() {
                        let completion = Completion {
                            session_id: shared.session_id,
                            rendered_buffers: shared.rendered,
                            cancelled,
                        };
                        outcome.completion = Some((callback, completion));
                    }
                }
            }
        }

        shared.state = t.state;
        if previous != t.state {
            debug!(
                session_id = %shared.session_id,
                "Session state {} -> {}", previous, t.state
            );
            outcome.state_changed = Some((shared.session_id, t.state));
        }
        outcome
    }

    fn dispatch(&self, outcome: Outcome) {
        if let Some((session_id, state)) = outcome.state_changed {
            self.publish(SessionEvent::state_changed(session_id, state));
        }
        if let Some(session_id) = outcome.halt {
            self.send(Message::Halt { session_id });
        }
        if let Some(session_id) = outcome.drain {
            self.send(Message::Drain { session_id });
        }
        if let Some((callback, completion)) = outcome.completion {
            info!(
                session_id = %completion.session_id,
                rendered = completion.rendered_buffers,
                cancelled = completion.cancelled,
                "Playback session complete"
            );
            self.publish(SessionEvent::completed(
                completion.session_id,
                completion.rendered_buffers,
                completion.cancelled,
            ));
            callback(completion);
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn send(&self, message: Message) {
        if let Err(e) = self.control_tx.send(message) {
            error!("Scheduler task is gone, dropping {:?}", e.0);
        }
    }

    /// Move the queue to the device. Runs on the scheduler task only.
    fn drain(&self, session_id: Uuid) {
        let batch: Vec<PcmBuffer> = {
            let mut shared = self.lock();
            if !shared.is_active(session_id) {
                trace!(%session_id, "Skipping drain for inactive session");
                return;
            }
            let batch: Vec<PcmBuffer> = shared.queue.drain(..).collect();
            shared.pending += batch.len();
            batch
        };

        if !batch.is_empty() {
            trace!(%session_id, buffers = batch.len(), "Submitting buffers");
        }

        for buffer in batch {
            if !self.lock().is_active(session_id) {
                debug!(%session_id, "Session ended during drain, abandoning batch");
                return;
            }

            let ticket = RenderTicket::new(session_id, self.render_tx.clone());
            if let Err(e) = self.device.submit(buffer, ticket) {
                error!(%session_id, "Failed to submit buffer to output device: {}", e);
                let mut shared = self.lock();
                if shared.session_id == session_id {
                    shared.pending = shared.pending.saturating_sub(1);
                }
            }
        }

        let outcome = {
            let mut shared = self.lock();
            if shared.session_id != session_id {
                return;
            }
            let t = transition(
                shared.state,
                Input::Drained {
                    outstanding: shared.outstanding(),
                },
            );
            self.apply(&mut shared, t)
        };
        self.dispatch(outcome);
    }

    /// Account for one rendered buffer. Runs on the scheduler task only.
    fn rendered(&self, notice: RenderedNotice) {
        let outcome = {
            let mut shared = self.lock();
            if !shared.is_active(notice.session_id) {
                trace!(session_id = %notice.session_id, "Ignoring stale render notice");
                return;
            }
            shared.pending = shared.pending.saturating_sub(1);
            shared.rendered += 1;
            let t = transition(
                shared.state,
                Input::Rendered {
                    outstanding: shared.outstanding(),
                },
            );
            self.apply(&mut shared, t)
        };
        self.dispatch(outcome);
    }
}

fn start_rejected(state: SessionState) -> Error {
    Error::InvalidState(format!("cannot start a session while {}", state))
}

async fn run(
    core: Arc<Core>,
    mut control_rx: mpsc::UnboundedReceiver<Message>,
    mut render_rx: mpsc::UnboundedReceiver<RenderedNotice>,
) {
    loop {
        tokio::select! {
            Some(message) = control_rx.recv() => match message {
                Message::Drain { session_id } => core.drain(session_id),
                Message::Halt { session_id } => {
                    debug!(%session_id, "Clearing output device");
                    core.device.clear();
                }
            },
            Some(notice) = render_rx.recv() => core.rendered(notice),
            else => break,
        }
    }
}

/// Session-based scheduler feeding an [`OutputDevice`].
///
/// Dropping the scheduler aborts its background task; buffers already handed
/// to the device keep playing.
pub struct PlaybackScheduler {
    core: Arc<Core>,
    task: JoinHandle<()>,
}

impl PlaybackScheduler {
    /// Create a scheduler and spawn its task.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(device: Arc<dyn OutputDevice>, trailing_pad: Duration) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (render_tx, render_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let core = Arc::new(Core {
            device,
            shared: Mutex::new(Shared {
                state: SessionState::Idle,
                session_id: Uuid::nil(),
                queue: VecDeque::new(),
                pending: 0,
                rendered: 0,
                on_complete: None,
            }),
            events,
            control_tx,
            render_tx,
            trailing_pad,
        });

        let task = tokio::spawn(run(Arc::clone(&core), control_rx, render_rx));
        Self { core, task }
    }

    /// Create a scheduler with the configured trailing pad
    pub fn from_config(device: Arc<dyn OutputDevice>, config: &AudioConfig) -> Self {
        Self::new(device, Duration::from_millis(config.trailing_pad_ms as u64))
    }

    /// Begin a new session.
    ///
    /// `on_complete` runs exactly once: when every buffer (trailing pad
    /// included) has rendered after [`finish_streaming`](Self::finish_streaming),
    /// or immediately on [`stop`](Self::stop).
    ///
    /// # Errors
    /// - `InvalidState` if a session is already playing or finishing
    /// - `Device` if the output device cannot be started; the scheduler
    ///   stays `Idle`
    pub fn start<F>(&self, on_complete: F) -> Result<Uuid>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        {
            let shared = self.core.lock();
            if !transition(shared.state, Input::Start).accepted {
                return Err(start_rejected(shared.state));
            }
        }

        // May block on the audio thread; render notices must not wait on it
        self.core.device.start().map_err(|e| match e {
            Error::Device(msg) => Error::Device(msg),
            other => Error::Device(other.to_string()),
        })?;

        let (session_id, outcome) = {
            let mut shared = self.core.lock();
            let t = transition(shared.state, Input::Start);
            if !t.accepted {
                // Another start won the race while the device was starting
                return Err(start_rejected(shared.state));
            }
            let outcome = self.core.apply(&mut shared, t);
            shared.on_complete = Some(Box::new(on_complete));
            (shared.session_id, outcome)
        };

        info!(%session_id, "Playback session started");
        self.core.dispatch(outcome);
        Ok(session_id)
    }

    /// Decode a chunk and queue it for playback.
    ///
    /// A no-op unless the session is `Playing`. Empty chunks are skipped.
    ///
    /// # Errors
    /// `Decode` if the chunk cannot be decoded. The chunk is dropped, a
    /// `BufferDropped` event is published, and the session carries on.
    pub fn enqueue(&self, chunk: PlaybackChunk) -> Result<()> {
        let session_id = {
            let shared = self.core.lock();
            if shared.state != SessionState::Playing {
                debug!("Ignoring chunk while session is {}", shared.state);
                return Ok(());
            }
            shared.session_id
        };

        let buffer = match chunk.decode(self.core.device.sample_rate()) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(%session_id, "Dropping chunk that failed to decode: {}", e);
                self.core
                    .publish(SessionEvent::buffer_dropped(session_id, e.to_string()));
                return Err(e);
            }
        };

        if buffer.is_empty() {
            trace!(%session_id, "Skipping empty buffer");
            return Ok(());
        }

        let outcome = {
            let mut shared = self.core.lock();
            if shared.session_id != session_id {
                debug!(%session_id, "Session replaced while decoding, dropping buffer");
                return Ok(());
            }
            let t = transition(shared.state, Input::Enqueue);
            if !t.accepted {
                debug!("Ignoring chunk while session is {}", shared.state);
                return Ok(());
            }
            shared.queue.push_back(buffer);
            self.core.apply(&mut shared, t)
        };
        self.core.dispatch(outcome);
        Ok(())
    }

    /// Signal that no more chunks will arrive.
    ///
    /// Appends the trailing silence pad and flushes the queue. Completion
    /// fires once everything outstanding has rendered. Ignored unless
    /// `Playing`.
    pub fn finish_streaming(&self) {
        let outcome = {
            let mut shared = self.core.lock();
            let t = transition(shared.state, Input::FinishStreaming);
            if !t.accepted {
                debug!("Ignoring finish_streaming while session is {}", shared.state);
                return;
            }
            debug!(
                session_id = %shared.session_id,
                queued = shared.queue.len(),
                pending = shared.pending,
                "Finishing stream"
            );
            self.core.apply(&mut shared, t)
        };
        self.core.dispatch(outcome);
    }

    /// Cancel the current session.
    ///
    /// Safe to call at any time and from any thread. Clears the queue, fires
    /// the completion callback if it has not fired yet, and returns to `Idle`.
    pub fn stop(&self) {
        let outcome = {
            let mut shared = self.core.lock();
            let t = transition(shared.state, Input::Stop);
            self.core.apply(&mut shared, t)
        };
        self.core.dispatch(outcome);
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.core.lock().state
    }

    /// Current (or most recent) session id; nil before the first start
    pub fn session_id(&self) -> Uuid {
        self.core.lock().session_id
    }

    /// Buffers submitted to the device and not yet rendered
    pub fn pending_buffer_count(&self) -> usize {
        self.core.lock().pending
    }

    /// Buffers queued but not yet submitted
    pub fn queued_buffer_count(&self) -> usize {
        self.core.lock().queue.len()
    }

    /// Rate buffers are converted to
    pub fn sample_rate(&self) -> u32 {
        self.core.device.sample_rate()
    }

    /// Silence appended by `finish_streaming`
    pub fn trailing_pad(&self) -> Duration {
        self.core.trailing_pad
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.core.events.subscribe()
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}
