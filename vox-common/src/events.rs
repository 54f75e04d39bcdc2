//! Event types for playback session observers

use uuid::Uuid;

/// Playback session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session running (initial state, and the state after stop)
    Idle,
    /// Accepting chunks and submitting buffers
    Playing,
    /// No more chunks; waiting for outstanding buffers to render
    Finishing,
    /// Every buffer rendered; completion signaled
    Completed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Playing => write!(f, "playing"),
            SessionState::Finishing => write!(f, "finishing"),
            SessionState::Completed => write!(f, "completed"),
        }
    }
}

/// Session event types broadcast by the playback scheduler
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Session moved to a new state
    StateChanged {
        session_id: Uuid,
        state: SessionState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A chunk failed to decode and was dropped; the session continues
    BufferDropped {
        session_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Completion signaled (natural end or cancellation)
    Completed {
        session_id: Uuid,
        rendered_buffers: u64,
        cancelled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SessionEvent {
    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            SessionEvent::StateChanged { session_id, .. }
            | SessionEvent::BufferDropped { session_id, .. }
            | SessionEvent::Completed { session_id, .. } => *session_id,
        }
    }

    pub fn state_changed(session_id: Uuid, state: SessionState) -> Self {
        SessionEvent::StateChanged {
            session_id,
            state,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn buffer_dropped(session_id: Uuid, reason: impl Into<String>) -> Self {
        SessionEvent::BufferDropped {
            session_id,
            reason: reason.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn completed(session_id: Uuid, rendered_buffers: u64, cancelled: bool) -> Self {
        SessionEvent::Completed {
            session_id,
            rendered_buffers,
            cancelled,
            timestamp: chrono::Utc::now(),
        }
    }
}
