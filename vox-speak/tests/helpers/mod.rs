//! Test helper modules for vox-speak integration tests
//!
//! - RecordingDevice: in-memory output device whose renders are driven by the test
//! - chunk builders for stitcher and pipeline scenarios
//! - wait_until: poll a condition while the scheduler task runs

#![allow(dead_code, unused_imports)]

pub mod chunks;
pub mod recording_device;

pub use chunks::{ramp, tone};
pub use recording_device::RecordingDevice;

use std::time::Duration;

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Default timeout for scheduler round trips
pub const SETTLE: Duration = Duration::from_secs(2);
