//! Output device abstraction
//!
//! The scheduler talks to audio hardware only through [`OutputDevice`]. Each
//! submitted buffer carries a [`RenderTicket`]; the device redeems the ticket
//! once the buffer has been fully played, which is how the scheduler learns
//! about render progress.

use crate::error::Result;
use tokio::sync::mpsc;
use uuid::Uuid;
use vox_common::PcmBuffer;

/// Message sent back to the scheduler when a ticket is redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RenderedNotice {
    pub session_id: Uuid,
}

/// Proof of submission for one buffer.
///
/// Redeem with [`RenderTicket::rendered`] when the buffer has finished
/// playing. Dropping a ticket without redeeming it reports nothing; devices
/// do that for buffers discarded by [`OutputDevice::clear`].
#[derive(Debug)]
pub struct RenderTicket {
    session_id: Uuid,
    tx: mpsc::UnboundedSender<RenderedNotice>,
}

impl RenderTicket {
    pub(crate) fn new(session_id: Uuid, tx: mpsc::UnboundedSender<RenderedNotice>) -> Self {
        Self { session_id, tx }
    }

    /// Session the buffer was submitted for
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Report the buffer as rendered
    pub fn rendered(self) {
        // Scheduler already gone; nothing left to notify
        let _ = self.tx.send(RenderedNotice {
            session_id: self.session_id,
        });
    }
}

/// Audio sink consumed by the playback scheduler.
///
/// Implementations must play submitted buffers strictly in submission order.
pub trait OutputDevice: Send + Sync + 'static {
    /// Rate the device renders at; decoded chunks are resampled to it
    fn sample_rate(&self) -> u32;

    /// Prepare the device for a new session (open or resume the stream)
    fn start(&self) -> Result<()>;

    /// Queue one buffer behind everything submitted before it
    fn submit(&self, buffer: PcmBuffer, ticket: RenderTicket) -> Result<()>;

    /// Discard everything still queued, dropping tickets unredeemed
    fn clear(&self);
}
