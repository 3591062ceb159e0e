//! Dynamics Stage
//!
//! Compression toward a target crest factor, integrated-loudness
//! normalization, then peak limiting as the last step.

use serde_json::json;
use tracing::debug;

use super::stage::StageParameters;
use crate::config::EnhancementConfig;
use crate::dsp::{integrated_loudness, Compressor, CompressorParams, Limiter, Processor};
use crate::engine::{db_to_linear, linear_to_db, AudioBuffer};
use crate::error::{EnhanceError, Result};

const STAGE: &str = "dynamics";

/// Largest normalization gain in either direction (dB)
pub const MAX_NORMALIZATION_DB: f64 = 20.0;

/// Acceptable distance from the loudness target (LU)
pub const LOUDNESS_TOLERANCE: f64 = 0.5;

/// Correction passes after the first normalization gain
const REFINEMENT_PASSES: usize = 2;

/// Crest factor (dB) at or below which compression is skipped
pub fn target_crest_db(preserve_dynamics: bool) -> f32 {
    if preserve_dynamics {
        18.0
    } else {
        12.0
    }
}

/// Compressor settings for the config
pub fn compressor_params(preserve_dynamics: bool) -> CompressorParams {
    if preserve_dynamics {
        CompressorParams::gentle()
    } else {
        CompressorParams::firm()
    }
}

#[derive(Debug, Clone)]
pub struct DynamicsOutcome {
    pub buffer: AudioBuffer,
    pub ran: bool,
    pub parameters: StageParameters,
}

fn crest_factor_db(buffer: &AudioBuffer) -> Option<f32> {
    let rms = buffer.rms();
    (rms > 0.0).then(|| linear_to_db(buffer.peak() / rms))
}

/// Apply compression, loudness normalization and limiting
pub fn apply_dynamics(input: &AudioBuffer, config: &EnhancementConfig) -> Result<DynamicsOutcome> {
    let mut parameters = StageParameters::new();
    if !config.dynamics_enabled() {
        return Ok(DynamicsOutcome {
            buffer: input.clone(),
            ran: false,
            parameters,
        });
    }
    if !input.is_finite() {
        return Err(EnhanceError::processing(STAGE, "input contains NaN or infinite samples"));
    }

    // (a) compression
    let preserve = config.preserve_dynamics();
    let crest = crest_factor_db(input);
    let target_crest = target_crest_db(preserve);
    let compressed = match crest {
        Some(c) if c > target_crest => {
            let params = compressor_params(preserve);
            let mut compressor = Compressor::new(params, input.sample_rate())?;
            let out = compressor.process(input)?;
            parameters.insert("compressor".to_string(), compressor.parameters());
            parameters.insert(
                "compressor_max_reduction_db".to_string(),
                json!(compressor.peak_reduction_db()),
            );
            out
        }
        _ => {
            parameters.insert("compressor".to_string(), json!("skipped"));
            input.clone()
        }
    };
    parameters.insert("crest_factor_db".to_string(), json!(crest));
    parameters.insert("target_crest_db".to_string(), json!(target_crest));

    // (b) loudness normalization
    let target = config.target_loudness_lufs() as f64;
    let normalized = normalize_loudness(&compressed, target, &mut parameters)?;

    // (c) limiting
    let mut limiter = Limiter::default();
    let limited = limiter.process(&normalized)?;
    parameters.insert("limiter".to_string(), limiter.parameters());
    parameters.insert(
        "limiter_max_reduction_db".to_string(),
        json!(limiter.max_reduction_db()),
    );

    if !limited.is_finite() {
        return Err(EnhanceError::processing(STAGE, "output contains non-finite samples"));
    }

    Ok(DynamicsOutcome {
        buffer: limited,
        ran: true,
        parameters,
    })
}

/// Scale `buffer` toward `target` LUFS; silent buffers are returned unchanged
fn normalize_loudness(
    buffer: &AudioBuffer,
    target: f64,
    parameters: &mut StageParameters,
) -> Result<AudioBuffer> {
    let Some(initial) = integrated_loudness(buffer)? else {
        parameters.insert("loudness".to_string(), json!("silent"));
        return Ok(buffer.clone());
    };

    let mut total_gain_db = 0.0_f64;
    let mut measured = initial.lufs;
    let mut current = buffer.clone();

    for pass in 0..=REFINEMENT_PASSES {
        let error = target - measured;
        if error.abs() <= LOUDNESS_TOLERANCE {
            break;
        }
        let next_total =
            (total_gain_db + error).clamp(-MAX_NORMALIZATION_DB, MAX_NORMALIZATION_DB);
        if (next_total - total_gain_db).abs() < 1e-6 {
            // Gain limit reached
            break;
        }
        total_gain_db = next_total;
        current = buffer.scaled(db_to_linear(total_gain_db as f32))?;
        match integrated_loudness(&current)? {
            Some(m) => measured = m.lufs,
            None => break,
        }
        debug!(
            "loudness pass {}: gain {:+.2} dB -> {:.2} LUFS (target {:.1})",
            pass, total_gain_db, measured, target
        );
    }

    parameters.insert("input_lufs".to_string(), json!(initial.lufs));
    parameters.insert("output_lufs".to_string(), json!(measured));
    parameters.insert("target_lufs".to_string(), json!(target));
    parameters.insert("loudness_gain_db".to_string(), json!(total_gain_db));
    parameters.insert("loudness_method".to_string(), json!(initial.method));

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityLevel;
    use crate::dsp::DEFAULT_CEILING_DB;
    use crate::engine::{generate_test_tone, ChannelLayout};

    fn config(preserve: bool, target: f32) -> EnhancementConfig {
        EnhancementConfig::preset(QualityLevel::Standard)
            .to_builder()
            .preserve_dynamics(preserve)
            .target_loudness_lufs(target)
            .build()
            .unwrap()
    }

    #[test]
    fn test_disabled_is_passthrough() {
        let input = generate_test_tone(440.0, 0.5, 1.0, 44100).unwrap();
        let outcome = apply_dynamics(&input, &EnhancementConfig::preset(QualityLevel::Minimal)).unwrap();
        assert!(!outcome.ran);
        assert_eq!(outcome.buffer, input);
    }

    #[test]
    fn test_quiet_tone_normalized_to_target() {
        let input = generate_test_tone(1000.0, 0.05, 3.0, 48000).unwrap();
        let outcome = apply_dynamics(&input, &config(true, -20.0)).unwrap();
        let lufs = integrated_loudness(&outcome.buffer).unwrap().unwrap().lufs;
        assert!((lufs + 20.0).abs() <= 0.6, "measured {}", lufs);
        // sine crest is 3 dB, well under the target
        assert_eq!(outcome.parameters["compressor"], "skipped");
    }

    #[test]
    fn test_peaks_never_exceed_ceiling() {
        let input = generate_test_tone(200.0, 0.9, 2.0, 44100).unwrap();
        let outcome = apply_dynamics(&input, &config(false, 0.0)).unwrap();
        assert!(outcome.buffer.peak() <= db_to_linear(DEFAULT_CEILING_DB) + 1e-6);
    }

    #[test]
    fn test_gain_is_bounded() {
        let input = generate_test_tone(1000.0, 0.001, 2.0, 48000).unwrap();
        let outcome = apply_dynamics(&input, &config(true, 0.0)).unwrap();
        let gain = outcome.parameters["loudness_gain_db"].as_f64().unwrap();
        assert!(gain <= MAX_NORMALIZATION_DB + 1e-9);
    }

    #[test]
    fn test_spiky_signal_is_compressed() {
        let sr = 44100;
        let mut samples = vec![0.01_f32; sr as usize];
        for i in (0..samples.len()).step_by(4410) {
            samples[i] = 0.9;
        }
        let input = AudioBuffer::from_channels(vec![samples], sr).unwrap();
        let outcome = apply_dynamics(&input, &config(false, -14.0)).unwrap();
        assert!(outcome.parameters["compressor"].is_object());
    }

    #[test]
    fn test_silence_passes_through_normalization() {
        let input = AudioBuffer::silent(44100, ChannelLayout::Stereo, 44100).unwrap();
        let outcome = apply_dynamics(&input, &config(true, -14.0)).unwrap();
        assert_eq!(outcome.parameters["loudness"], "silent");
        assert_eq!(outcome.buffer, input);
    }
}
