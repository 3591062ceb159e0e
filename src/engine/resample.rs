//! Band-limited sample rate conversion
//!
//! Wraps a `rubato` windowed-sinc resampler for converting a whole channel in
//! one pass. Used around fixed-rate models; exported audio always keeps the
//! input rate.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{EnhanceError, Result};

const SINC_LEN: usize = 256;

/// Delay of the sinc kernel, in input samples
const KERNEL_DELAY: usize = SINC_LEN / 2;

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Resample one channel from `source_rate` to `target_rate`
///
/// The output is time-aligned with the input and holds
/// `round(len * target_rate / source_rate)` samples.
///
/// # Errors
/// * `InvalidParameter` - If either rate is zero
/// * `ProcessingFailed` - If the resampler cannot be built or run
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == 0 || target_rate == 0 {
        return Err(EnhanceError::InvalidParameter {
            param: "sample_rate".to_string(),
            value: format!("{} -> {}", source_rate, target_rate),
            expected: "non-zero rates".to_string(),
        });
    }
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let target_len = (samples.len() as f64 * ratio).round() as usize;

    // Lead with enough silence that the kernel delay lands on a whole output
    // sample, so the skip below is exact rather than rounded.
    let divisor = gcd(source_rate as usize, target_rate as usize);
    let (num, den) = (target_rate as usize / divisor, source_rate as usize / divisor);
    let lead = (den - KERNEL_DELAY % den) % den;
    let skip = (lead + KERNEL_DELAY) / den * num;

    let mut padded = vec![0.0_f32; lead];
    padded.extend_from_slice(samples);
    padded.resize(lead + samples.len() + 2 * SINC_LEN, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, sinc_params(), padded.len(), 1)
        .map_err(|e| EnhanceError::processing("resample", e.to_string()))?;
    let output = resampler
        .process(&vec![padded], None)
        .map_err(|e| EnhanceError::processing("resample", e.to_string()))?;

    let mut resampled: Vec<f32> = output
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .skip(skip)
        .take(target_len)
        .collect();
    resampled.resize(target_len, 0.0);
    Ok(resampled)
}
