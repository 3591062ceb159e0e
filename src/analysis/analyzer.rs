//! Quality analyzer
//!
//! `analyze` is a pure function of the buffer: the same samples always give
//! bit-identical metrics. All divisions have defined fallbacks so only an empty
//! buffer is an error.

use crate::analysis::metrics::QualityMetrics;
use crate::analysis::spectrum::{welch_psd, FrameSpectra};
use crate::engine::AudioBuffer;
use crate::error::{EnhanceError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Samples with |x| at or above this are counted as clipped
pub const CLIPPING_THRESHOLD: f32 = 0.99;

/// Frames with RMS below this level are silent (-60 dBFS)
pub const SILENCE_THRESHOLD_DB: f64 = -60.0;

/// Analysis frame length for silence and temporal SNR (20 ms)
pub const FRAME_SECS: f64 = 0.02;

/// FFT size for flatness and the spectral SNR estimate
pub const FFT_SIZE: usize = 2048;

/// Hop between flatness frames
pub const FLATNESS_HOP: usize = 512;

/// Fraction of frames (or bins) treated as the noise floor
pub const NOISE_FLOOR_FRACTION: f64 = 0.1;

/// Upper clamp of the SNR estimate
pub const MAX_SNR_DB: f64 = 60.0;

/// Energy below which a quantity is treated as zero
const ENERGY_EPSILON: f64 = 1e-20;

/// Magnitude floor used in the flatness geometric mean
const MAGNITUDE_FLOOR: f64 = 1e-10;

// ============================================================================
// Analyzer
// ============================================================================

/// Compute quality metrics for a buffer
///
/// # Errors
/// * `Analysis` - If the buffer holds no samples
pub fn analyze(buffer: &AudioBuffer) -> Result<QualityMetrics> {
    if buffer.is_empty() {
        return Err(EnhanceError::Analysis {
            reason: "buffer contains no samples".to_string(),
        });
    }

    let clipping_ratio = clipping_ratio(buffer);

    // Non-finite samples were counted as clipped; everything else sees zero.
    let sanitized: Vec<Vec<f32>> = buffer
        .channel_data()
        .iter()
        .map(|ch| ch.iter().map(|&s| if s.is_finite() { s } else { 0.0 }).collect())
        .collect();
    let mono = mono_mix(&sanitized);
    let frame_len = ((buffer.sample_rate() as f64 * FRAME_SECS).round() as usize).max(1);

    let snr_db = estimate_snr(&mono, frame_len);
    let spectral_flatness = spectral_flatness(&mono);
    let dynamic_range_db = dynamic_range_db(&sanitized);
    let silence_ratio = silence_ratio(&mono, frame_len);

    Ok(QualityMetrics::from_measurements(
        snr_db,
        spectral_flatness,
        dynamic_range_db,
        clipping_ratio,
        silence_ratio,
    ))
}

// ============================================================================
// Individual measurements
// ============================================================================

/// Fraction of all samples at or near full scale; NaN and infinities count as clipped
pub fn clipping_ratio(buffer: &AudioBuffer) -> f64 {
    let total = buffer.channels() * buffer.len();
    if total == 0 {
        return 0.0;
    }
    let clipped = buffer
        .iter_samples()
        .filter(|s| !s.is_finite() || s.abs() >= CLIPPING_THRESHOLD)
        .count();
    clipped as f64 / total as f64
}

/// Peak over RMS of all channels in dB, 0 for silence
pub fn dynamic_range_db(channels: &[Vec<f32>]) -> f64 {
    let (sum_sq, peak, count) = channels
        .iter()
        .flat_map(|ch| ch.iter())
        .fold((0.0_f64, 0.0_f64, 0usize), |(sum, peak, n), &s| {
            let s = s as f64;
            (sum + s * s, peak.max(s.abs()), n + 1)
        });
    if count == 0 {
        return 0.0;
    }
    let rms = (sum_sq / count as f64).sqrt();
    if rms < 1e-10 || peak < 1e-10 {
        return 0.0;
    }
    20.0 * (peak / rms).log10()
}

/// Fraction of 20 ms frames whose RMS is below the silence threshold
pub fn silence_ratio(mono: &[f32], frame_len: usize) -> f64 {
    let threshold = 10f64.powf(SILENCE_THRESHOLD_DB / 20.0);
    let energies = frame_energies(mono, frame_len);
    if energies.is_empty() {
        return 1.0;
    }
    let silent = energies.iter().filter(|e| e.sqrt() < threshold).count();
    silent as f64 / energies.len() as f64
}

/// Mean spectral flatness of Hann-windowed frames that carry energy
///
/// All-silent input is perfectly flat (1.0).
pub fn spectral_flatness(mono: &[f32]) -> f64 {
    let mut total = 0.0_f64;
    let mut frames = 0usize;

    for magnitudes in FrameSpectra::new(mono, FFT_SIZE, FLATNESS_HOP) {
        let n = magnitudes.len() as f64;
        let arithmetic = magnitudes.iter().map(|&m| m as f64).sum::<f64>() / n;
        if arithmetic < MAGNITUDE_FLOOR {
            continue;
        }
        let log_mean = magnitudes
            .iter()
            .map(|&m| (m as f64).max(MAGNITUDE_FLOOR).ln())
            .sum::<f64>()
            / n;
        total += (log_mean.exp() / arithmetic).clamp(0.0, 1.0);
        frames += 1;
    }

    if frames == 0 {
        1.0
    } else {
        total / frames as f64
    }
}

/// Estimated SNR in dB, clamped to [0, 60]
///
/// Two floor estimates are combined: the quietest 10% of 20 ms frames (pauses
/// between phrases) and the quietest 10% of Welch PSD bins (a stationary floor
/// under continuous material). The higher of the two estimates wins.
pub fn estimate_snr(mono: &[f32], frame_len: usize) -> f64 {
    let temporal = temporal_snr_db(mono, frame_len);
    let spectral = spectral_snr_db(mono);
    temporal.max(spectral).clamp(0.0, MAX_SNR_DB)
}

fn temporal_snr_db(mono: &[f32], frame_len: usize) -> f64 {
    let mut energies = frame_energies(mono, frame_len);
    if energies.len() < 2 {
        return 0.0;
    }
    energies.sort_by(|a, b| a.total_cmp(b));
    floor_ratio_db(&energies)
}

fn spectral_snr_db(mono: &[f32]) -> f64 {
    let psd = welch_psd(mono, FFT_SIZE);
    // skip DC so offsets do not read as signal
    let mut bins: Vec<f64> = psd.into_iter().skip(1).collect();
    bins.sort_by(|a, b| a.total_cmp(b));
    floor_ratio_db(&bins)
}

/// Ratio in dB between the mean of the upper 90% and the lowest 10% of sorted energies
fn floor_ratio_db(sorted: &[f64]) -> f64 {
    let floor_count = ((sorted.len() as f64 * NOISE_FLOOR_FRACTION) as usize).max(1);
    if sorted.len() <= floor_count {
        return 0.0;
    }
    let (floor, rest) = sorted.split_at(floor_count);
    let noise = floor.iter().sum::<f64>() / floor.len() as f64;
    let signal = rest.iter().sum::<f64>() / rest.len() as f64;

    if signal < ENERGY_EPSILON {
        return 0.0;
    }
    if noise < ENERGY_EPSILON {
        return MAX_SNR_DB;
    }
    10.0 * (signal / noise).log10()
}

/// Mean-square energy of consecutive non-overlapping frames (last partial frame included)
fn frame_energies(mono: &[f32], frame_len: usize) -> Vec<f64> {
    mono.chunks(frame_len.max(1))
        .map(|frame| {
            frame.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / frame.len() as f64
        })
        .collect()
}

fn mono_mix(channels: &[Vec<f32>]) -> Vec<f32> {
    match channels {
        [mono] => mono.clone(),
        [left, right] => left
            .iter()
            .zip(right.iter())
            .map(|(l, r)| 0.5 * (l + r))
            .collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
