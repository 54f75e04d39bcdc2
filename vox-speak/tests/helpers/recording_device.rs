//! Output device that records submissions and renders only on request

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use vox_common::PcmBuffer;
use vox_speak::error::{Error, Result};
use vox_speak::playback::{OutputDevice, RenderTicket};

#[derive(Default)]
struct Recorded {
    starts: usize,
    clears: usize,
    submitted: Vec<PcmBuffer>,
    tickets: VecDeque<RenderTicket>,
}

/// In-memory [`OutputDevice`].
///
/// Submitted buffers are kept in order; nothing renders until the test calls
/// [`render_next`](Self::render_next) or [`render_all`](Self::render_all).
pub struct RecordingDevice {
    sample_rate: u32,
    fail_start: bool,
    recorded: Mutex<Recorded>,
}

impl RecordingDevice {
    pub fn new(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            sample_rate,
            fail_start: false,
            recorded: Mutex::new(Recorded::default()),
        })
    }

    /// Device whose `start` always fails
    pub fn failing(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            sample_rate,
            fail_start: true,
            recorded: Mutex::new(Recorded::default()),
        })
    }

    pub fn starts(&self) -> usize {
        self.recorded.lock().unwrap().starts
    }

    pub fn clears(&self) -> usize {
        self.recorded.lock().unwrap().clears
    }

    pub fn submitted_count(&self) -> usize {
        self.recorded.lock().unwrap().submitted.len()
    }

    /// Copies of every buffer submitted so far, in order
    pub fn submitted(&self) -> Vec<PcmBuffer> {
        self.recorded.lock().unwrap().submitted.clone()
    }

    /// Tickets not yet redeemed or cleared
    pub fn outstanding(&self) -> usize {
        self.recorded.lock().unwrap().tickets.len()
    }

    /// Redeem the oldest outstanding ticket
    pub fn render_next(&self) -> bool {
        let ticket = self.recorded.lock().unwrap().tickets.pop_front();
        match ticket {
            Some(ticket) => {
                ticket.rendered();
                true
            }
            None => false,
        }
    }

    /// Redeem every outstanding ticket, oldest first
    pub fn render_all(&self) -> usize {
        let mut count = 0;
        while self.render_next() {
            count += 1;
        }
        count
    }

    /// Take outstanding tickets out of the device, as if their buffers were
    /// already committed to hardware and cannot be cleared
    pub fn take_tickets(&self) -> Vec<RenderTicket> {
        self.recorded.lock().unwrap().tickets.drain(..).collect()
    }
}

impl OutputDevice for RecordingDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&self) -> Result<()> {
        if self.fail_start {
            return Err(Error::Device("device unplugged".to_string()));
        }
        self.recorded.lock().unwrap().starts += 1;
        Ok(())
    }

    fn submit(&self, buffer: PcmBuffer, ticket: RenderTicket) -> Result<()> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.submitted.push(buffer);
        recorded.tickets.push_back(ticket);
        Ok(())
    }

    fn clear(&self) {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.clears += 1;
        recorded.tickets.clear();
    }
}
