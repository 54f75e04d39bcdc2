//! Sample rate conversion using rubato
//!
//! Engines and WAV blobs may arrive at a rate the output device does not run
//! at. Each buffer is converted independently, and the output length is
//! pinned to `ceil(input * out_rate / in_rate)` so durations stay exact
//! regardless of the resampler's internal delay.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Output frame count for `input_frames` converted from `input_rate` to
/// `output_rate` (rounded up).
pub fn expected_frames(input_frames: usize, input_rate: u32, output_rate: u32) -> usize {
    if input_rate == 0 {
        return 0;
    }
    let num = input_frames as u64 * output_rate as u64;
    num.div_ceil(input_rate as u64) as usize
}

/// Mono resampler
pub struct Resampler;

impl Resampler {
    /// Convert mono samples from `input_rate` to `output_rate`.
    ///
    /// Returns a copy when the rates match and an empty Vec for empty input.
    ///
    /// # Errors
    /// `Decode` if either rate is zero or rubato rejects the conversion
    pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
        if input_rate == 0 || output_rate == 0 {
            return Err(Error::Decode(format!(
                "invalid resample rates {}Hz -> {}Hz",
                input_rate, output_rate
            )));
        }
        if input_rate == output_rate {
            return Ok(input.to_vec());
        }
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let target = expected_frames(input.len(), input_rate, output_rate);
        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Linear,
            input.len(),
            1,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        let delay = resampler.output_delay();
        let mut output = resampler
            .process(&[input], None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?
            .swap_remove(0);

        // Flush the tail held back by the interpolator
        let tail = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| Error::Decode(format!("Resampling flush failed: {}", e)))?
            .swap_remove(0);
        output.extend_from_slice(&tail);

        let mut output: Vec<f32> = output.into_iter().skip(delay).collect();
        output.resize(target, 0.0);

        debug!(
            "Resampled {} frames at {}Hz to {} frames at {}Hz",
            input.len(),
            input_rate,
            output.len(),
            output_rate
        );
        Ok(output)
    }
}
