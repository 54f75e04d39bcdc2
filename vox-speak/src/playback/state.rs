//! Playback session state machine
//!
//! ```text
//!          start              finish_streaming         outstanding == 0
//!   Idle ─────────▶ Playing ───────────────────▶ Finishing ─────────────▶ Completed
//!    ▲                 │                            │                        │
//!    └──── stop ───────┴────────────────────────────┴────────────────────────┘
//! ```
//!
//! Transitions are a pure function of `(state, input)`. The scheduler owns the
//! state and carries out the returned effects; an input that is not legal in
//! the current state comes back rejected with no effects.

use vox_common::SessionState;

/// Inputs driving the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Caller starts a new session
    Start,
    /// Caller hands over a decoded buffer
    Enqueue,
    /// Caller has no more chunks
    FinishStreaming,
    /// Scheduler finished submitting the queue; `outstanding` is the number
    /// of buffers still queued or awaiting render
    Drained { outstanding: usize },
    /// Device reported a buffer rendered; `outstanding` is counted after the
    /// decrement
    Rendered { outstanding: usize },
    /// Caller cancels the session
    Stop,
}

/// Side effects the scheduler must carry out after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// New session id, empty queue, zeroed counters
    ResetCounters,
    /// Queue the trailing silence pad
    AppendTrailingPad,
    /// Submit queued buffers to the device
    ScheduleDrain,
    /// Drop queued buffers and discard anything the device still holds
    ClearQueue,
    /// Invoke the completion callback (if it has not fired yet)
    NotifyComplete { cancelled: bool },
}

/// Result of applying one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
    pub accepted: bool,
}

impl Transition {
    fn to(state: SessionState, effects: Vec<Effect>) -> Self {
        Self {
            state,
            effects,
            accepted: true,
        }
    }

    fn stay(state: SessionState) -> Self {
        Self::to(state, Vec::new())
    }

    fn rejected(state: SessionState) -> Self {
        Self {
            state,
            effects: Vec::new(),
            accepted: false,
        }
    }
}

/// Compute the next state and effects for `input` in `state`.
pub fn transition(state: SessionState, input: Input) -> Transition {
    use SessionState::*;

    match (state, input) {
        // A finished session may be replaced by a new one
        (Idle | Completed, Input::Start) => Transition::to(Playing, vec![Effect::ResetCounters]),

        (Playing, Input::Enqueue) => Transition::to(Playing, vec![Effect::ScheduleDrain]),

        (Playing, Input::FinishStreaming) => Transition::to(
            Finishing,
            vec![Effect::AppendTrailingPad, Effect::ScheduleDrain],
        ),

        (Finishing, Input::Drained { outstanding: 0 })
        | (Finishing, Input::Rendered { outstanding: 0 }) => Transition::to(
            Completed,
            vec![Effect::NotifyComplete { cancelled: false }],
        ),

        (s, Input::Drained { .. } | Input::Rendered { .. }) => Transition::stay(s),

        (_, Input::Stop) => Transition::to(
            Idle,
            vec![Effect::ClearQueue, Effect::NotifyComplete { cancelled: true }],
        ),

        (s, Input::Start | Input::Enqueue | Input::FinishStreaming) => Transition::rejected(s),
    }
}
