//! Audio output using cpal
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated thread
//! that only handles play/shutdown requests. Buffers are shared with the
//! audio callback through a mutex-guarded render queue: the callback pulls
//! mono samples from the front buffer, duplicates them across the device's
//! channels, and redeems each buffer's ticket once its last sample has been
//! written. When the queue runs dry the callback writes silence.

use crate::error::{Error, Result};
use crate::playback::output::{OutputDevice, RenderTicket};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use vox_common::PcmBuffer;

struct QueuedBuffer {
    samples: Vec<f32>,
    position: usize,
    ticket: RenderTicket,
}

/// Buffers waiting for the audio callback, in submission order
#[derive(Default)]
struct RenderQueue {
    buffers: VecDeque<QueuedBuffer>,
}

impl RenderQueue {
    fn push(&mut self, buffer: PcmBuffer, ticket: RenderTicket) {
        self.buffers.push_back(QueuedBuffer {
            samples: buffer.to_f32(),
            position: 0,
            ticket,
        });
    }

    /// Next mono sample; 0.0 on underrun.
    ///
    /// Tickets of buffers that ran out are moved into `finished`.
    fn next_sample(&mut self, finished: &mut Vec<RenderTicket>) -> f32 {
        while let Some(front) = self.buffers.front_mut() {
            if let Some(&sample) = front.samples.get(front.position) {
                front.position += 1;
                if front.position == front.samples.len() {
                    self.retire_front(finished);
                }
                return sample;
            }
            self.retire_front(finished);
        }
        0.0
    }

    fn retire_front(&mut self, finished: &mut Vec<RenderTicket>) {
        if let Some(done) = self.buffers.pop_front() {
            finished.push(done.ticket);
        }
    }

    fn clear(&mut self) -> usize {
        let dropped = self.buffers.len();
        self.buffers.clear();
        dropped
    }
}

type SharedQueue = Arc<Mutex<RenderQueue>>;

enum Control {
    Play(std_mpsc::Sender<Result<()>>),
    Shutdown,
}

/// cpal-backed [`OutputDevice`].
pub struct CpalOutput {
    queue: SharedQueue,
    control: Mutex<std_mpsc::Sender<Control>>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    device_name: String,
}

impl CpalOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device.
    ///
    /// # Arguments
    /// - `device_name`: device to use; falls back to the default device when
    ///   it cannot be found
    /// - `buffer_size`: frames per callback (None = device default)
    ///
    /// # Errors
    /// `Device` if no usable device exists or its stream cannot be built
    pub fn open(device_name: Option<&str>, buffer_size: Option<u32>) -> Result<Self> {
        let queue: SharedQueue = Arc::new(Mutex::new(RenderQueue::default()));
        let (control_tx, control_rx) = std_mpsc::channel();
        let (init_tx, init_rx) = std_mpsc::channel();

        let requested = device_name.map(str::to_string);
        let stream_queue = Arc::clone(&queue);
        let thread = thread::Builder::new()
            .name("vox-audio-output".to_string())
            .spawn(move || {
                let stream = match open_stream(requested.as_deref(), buffer_size, stream_queue) {
                    Ok((stream, sample_rate, name)) => {
                        let _ = init_tx.send(Ok((sample_rate, name)));
                        stream
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                control_loop(stream, control_rx);
            })
            .map_err(|e| Error::Device(format!("Failed to spawn audio thread: {}", e)))?;

        let (sample_rate, name) = init_rx
            .recv()
            .map_err(|_| Error::Device("audio thread exited during startup".to_string()))??;

        info!("Audio output ready: {} at {}Hz", name, sample_rate);
        Ok(Self {
            queue,
            control: Mutex::new(control_tx),
            thread: Some(thread),
            sample_rate,
            device_name: name,
        })
    }

    /// Name of the device actually opened
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn send(&self, control: Control) -> Result<()> {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(control)
            .map_err(|_| Error::Device("audio thread is not running".to_string()))
    }
}

impl OutputDevice for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&self) -> Result<()> {
        let (reply_tx, reply_rx) = std_mpsc::channel();
        self.send(Control::Play(reply_tx))?;
        reply_rx
            .recv()
            .map_err(|_| Error::Device("audio thread exited".to_string()))?
    }

    fn submit(&self, buffer: PcmBuffer, ticket: RenderTicket) -> Result<()> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(Error::Device(format!(
                "buffer at {}Hz submitted to {}Hz device",
                buffer.sample_rate(),
                self.sample_rate
            )));
        }
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(buffer, ticket);
        Ok(())
    }

    fn clear(&self) {
        let dropped = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("Cleared {} buffers from output queue", dropped);
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.send(Control::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

fn control_loop(stream: Stream, control_rx: std_mpsc::Receiver<Control>) {
    for control in control_rx {
        match control {
            Control::Play(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| Error::Device(format!("Failed to start stream: {}", e)));
                let _ = reply.send(result);
            }
            Control::Shutdown => break,
        }
    }

    if let Err(e) = stream.pause() {
        debug!("Failed to pause stream on shutdown: {}", e);
    }
    debug!("Audio output thread exiting");
}

fn select_device(requested: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = requested {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?;
        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            return Ok(device);
        }
        warn!("Requested device '{}' not found, falling back to default device", name);
    }

    host.default_output_device()
        .ok_or_else(|| Error::Device("No default output device found".to_string()))
}

fn open_stream(
    requested: Option<&str>,
    buffer_size: Option<u32>,
    queue: SharedQueue,
) -> Result<(Stream, u32, String)> {
    let device = select_device(requested)?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = device
        .default_output_config()
        .map_err(|e| Error::Device(format!("Failed to get default config: {}", e)))?;
    let sample_format = supported.sample_format();
    let mut config: StreamConfig = supported.config();
    if let Some(size) = buffer_size {
        config.buffer_size = cpal::BufferSize::Fixed(size);
    }

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}, buffer_size={:?}",
        config.sample_rate.0, config.channels, sample_format, config.buffer_size
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, queue)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, queue)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, queue)?,
        other => {
            return Err(Error::Device(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    };

    Ok((stream, config.sample_rate.0, name))
}

fn build_stream<T>(device: &Device, config: &StreamConfig, queue: SharedQueue) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut finished = Vec::new();
                {
                    let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
                    for frame in data.chunks_mut(channels) {
                        let value = T::from_sample(queue.next_sample(&mut finished));
                        for out in frame.iter_mut() {
                            *out = value;
                        }
                    }
                }
                for ticket in finished {
                    ticket.rendered();
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| Error::Device(format!("Failed to build stream: {}", e)))
}
