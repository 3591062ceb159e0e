//! Spectral Shaping Stage
//!
//! Gentle tonal correction: a rumble high-pass plus warmth, presence and air
//! boosts sized by how far each band sits below its target level relative to
//! the midrange. Well-balanced input gets (almost) no boost.

use serde_json::{json, Value};
use tracing::debug;

use super::stage::StageParameters;
use crate::analysis::analyzer::FFT_SIZE;
use crate::analysis::spectrum::{band_power, welch_psd};
use crate::config::EnhancementConfig;
use crate::dsp::{EqBand, Equalizer, Processor};
use crate::engine::AudioBuffer;
use crate::error::{EnhanceError, Result};

const STAGE: &str = "spectral";

pub const HIGHPASS_HZ: f32 = 30.0;

/// Peak ceiling the stage keeps output under
pub const HEADROOM_CEILING: f32 = 0.97;

/// Deficit (dB) at which a band receives its full boost
const FULL_BOOST_DEFICIT_DB: f64 = 6.0;

/// A band the stage may boost
struct ShapingBand {
    label: &'static str,
    low_hz: f64,
    high_hz: f64,
    /// Target level relative to the mid band (dB)
    target_db: f64,
    max_boost_db: f32,
    filter: fn(f32) -> EqBand,
}

const MID_BAND: (f64, f64) = (250.0, 2000.0);

fn warmth_shelf(gain_db: f32) -> EqBand {
    EqBand::low_shelf(100.0, gain_db)
}

fn presence_peak(gain_db: f32) -> EqBand {
    EqBand::peak(3000.0, gain_db, 1.0)
}

fn air_shelf(gain_db: f32) -> EqBand {
    EqBand::high_shelf(12000.0, gain_db)
}

const BANDS: [ShapingBand; 3] = [
    ShapingBand {
        label: "warmth",
        low_hz: 60.0,
        high_hz: 250.0,
        target_db: 3.0,
        max_boost_db: 2.0,
        filter: warmth_shelf,
    },
    ShapingBand {
        label: "presence",
        low_hz: 2000.0,
        high_hz: 6000.0,
        target_db: -6.0,
        max_boost_db: 2.0,
        filter: presence_peak,
    },
    ShapingBand {
        label: "air",
        low_hz: 8000.0,
        high_hz: 16000.0,
        target_db: -15.0,
        max_boost_db: 1.5,
        filter: air_shelf,
    },
];

#[derive(Debug, Clone)]
pub struct SpectralOutcome {
    pub buffer: AudioBuffer,
    pub ran: bool,
    pub parameters: StageParameters,
}

/// Boost for a band measured `relative_db` against the mid band
fn boost_for(relative_db: f64, target_db: f64, max_boost_db: f32) -> f32 {
    let deficit = target_db - relative_db;
    let amount = (deficit / FULL_BOOST_DEFICIT_DB).clamp(0.0, 1.0);
    (amount * max_boost_db as f64) as f32
}

fn to_db(power: f64) -> Option<f64> {
    (power > 0.0 && power.is_finite()).then(|| 10.0 * power.log10())
}

/// Peak the output may reach given the input peak
pub fn headroom_limit(input_peak: f32) -> f32 {
    if input_peak <= HEADROOM_CEILING {
        HEADROOM_CEILING
    } else {
        input_peak.min(1.0)
    }
}

/// Apply tonal shaping; pass-through when EQ is disabled
pub fn apply_spectral(input: &AudioBuffer, config: &EnhancementConfig) -> Result<SpectralOutcome> {
    let mut parameters = StageParameters::new();
    if !config.eq_enabled() {
        return Ok(SpectralOutcome {
            buffer: input.clone(),
            ran: false,
            parameters,
        });
    }

    let sample_rate = input.sample_rate();
    let psd = welch_psd(&input.mono_mix(), FFT_SIZE);
    let mid_db = to_db(band_power(&psd, sample_rate, MID_BAND.0, MID_BAND.1));

    let mut bands = vec![EqBand::high_pass(HIGHPASS_HZ)];
    let mut boosts = serde_json::Map::new();
    for band in &BANDS {
        let band_db = to_db(band_power(&psd, sample_rate, band.low_hz, band.high_hz));
        let gain = match (band_db, mid_db) {
            (Some(b), Some(m)) => boost_for(b - m, band.target_db, band.max_boost_db),
            // No measurable energy in the band or midrange: leave it alone
            _ => 0.0,
        };
        boosts.insert(band.label.to_string(), json!(gain));
        bands.push((band.filter)(gain));
    }

    let mut eq = Equalizer::new(bands, sample_rate)?;
    let shaped = eq.process(input)?;

    let limit = headroom_limit(input.peak());
    let peak = shaped.peak();
    let (output, headroom_gain) = if peak > limit {
        let gain = limit / peak;
        (shaped.scaled(gain)?, gain)
    } else {
        (shaped, 1.0)
    };

    if !output.is_finite() {
        return Err(EnhanceError::processing(STAGE, "filters produced non-finite samples"));
    }

    debug!("spectral shaping boosts: {:?}, headroom gain {:.3}", boosts, headroom_gain);

    parameters.insert("highpass_hz".to_string(), json!(HIGHPASS_HZ));
    parameters.insert("boosts_db".to_string(), Value::Object(boosts));
    parameters.insert("headroom_gain".to_string(), json!(headroom_gain));
    parameters.insert(
        "skipped_bands".to_string(),
        json!(eq.skipped().iter().map(|b| b.frequency).collect::<Vec<_>>()),
    );

    Ok(SpectralOutcome {
        buffer: output,
        ran: true,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityLevel;
    use crate::engine::generate_test_tone;
    use approx::assert_abs_diff_eq;

    fn eq_config() -> EnhancementConfig {
        EnhancementConfig::preset(QualityLevel::Standard)
    }

    #[test]
    fn test_disabled_is_passthrough() {
        let input = generate_test_tone(440.0, 0.5, 0.5, 44100).unwrap();
        let config = EnhancementConfig::preset(QualityLevel::Minimal);
        let outcome = apply_spectral(&input, &config).unwrap();
        assert!(!outcome.ran);
        assert_eq!(outcome.buffer, input);
    }

    #[test]
    fn test_boost_scales_with_deficit() {
        assert_eq!(boost_for(10.0, 3.0, 2.0), 0.0);
        assert_abs_diff_eq!(boost_for(0.0, 3.0, 2.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(boost_for(-20.0, 3.0, 2.0), 2.0, epsilon = 1e-6);
    }

    /// 1 kHz tone over a faint broadband bed
    fn mid_heavy(amplitude: f32) -> AudioBuffer {
        let tone = generate_test_tone(1000.0, amplitude, 1.0, 44100).unwrap();
        let mut seed = 0x2545_f491_u32;
        let samples = tone
            .channel(0)
            .iter()
            .map(|s| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                s + (seed as f32 / u32::MAX as f32 - 0.5) * 2e-3
            })
            .collect();
        AudioBuffer::from_channels(vec![samples], 44100).unwrap()
    }

    #[test]
    fn test_mid_tone_gets_boosts_and_stays_under_ceiling() {
        let input = mid_heavy(0.96);
        let outcome = apply_spectral(&input, &eq_config()).unwrap();
        assert!(outcome.ran);
        assert!(outcome.buffer.peak() <= HEADROOM_CEILING + 1e-6);
        let boosts = &outcome.parameters["boosts_db"];
        assert_abs_diff_eq!(boosts["warmth"].as_f64().unwrap(), 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(boosts["air"].as_f64().unwrap(), 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_low_sample_rate_skips_air_band() {
        let input = generate_test_tone(440.0, 0.3, 0.5, 16000).unwrap();
        let outcome = apply_spectral(&input, &eq_config()).unwrap();
        assert_eq!(outcome.parameters["skipped_bands"], json!([12000.0]));
    }

    #[test]
    fn test_headroom_limit() {
        assert_eq!(headroom_limit(0.5), HEADROOM_CEILING);
        assert_eq!(headroom_limit(0.99), 0.99);
        assert_eq!(headroom_limit(1.5), 1.0);
    }
}
