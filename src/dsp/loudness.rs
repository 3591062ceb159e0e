//! Integrated loudness measurement
//!
//! BS.1770 / EBU R128 integrated loudness via `ebur128`. Recordings shorter
//! than one gating block (or a meter that cannot be constructed) fall back to
//! an RMS-based estimate.

use ebur128::{EbuR128, Mode};
use serde::Serialize;
use tracing::debug;

use crate::engine::AudioBuffer;
use crate::error::Result;

/// Below this RMS (linear) a buffer has no meaningful loudness
const SILENT_RMS: f32 = 1e-6;

/// K-weighting offset applied to the RMS estimate
const RMS_OFFSET_DB: f64 = -0.691;

/// How a loudness value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoudnessMethod {
    Ebur128,
    RmsEstimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoudnessMeasurement {
    pub lufs: f64,
    pub method: LoudnessMethod,
}

/// Measure integrated loudness; `None` for silent or empty buffers
pub fn integrated_loudness(buffer: &AudioBuffer) -> Result<Option<LoudnessMeasurement>> {
    let rms = buffer.rms();
    if buffer.is_empty() || !(rms > SILENT_RMS) {
        return Ok(None);
    }

    match meter_loudness(buffer) {
        Ok(lufs) if lufs.is_finite() => {
            return Ok(Some(LoudnessMeasurement {
                lufs,
                method: LoudnessMethod::Ebur128,
            }))
        }
        Ok(_) => debug!("integrated loudness undefined (buffer shorter than a gating block)"),
        Err(reason) => debug!("loudness meter unavailable: {}", reason),
    }

    Ok(Some(LoudnessMeasurement {
        lufs: 20.0 * (rms as f64).log10() + RMS_OFFSET_DB,
        method: LoudnessMethod::RmsEstimate,
    }))
}

fn meter_loudness(buffer: &AudioBuffer) -> std::result::Result<f64, String> {
    let mut meter = EbuR128::new(buffer.channels() as u32, buffer.sample_rate(), Mode::I)
        .map_err(|e| format!("{:?}", e))?;
    meter
        .add_frames_f32(&buffer.to_interleaved())
        .map_err(|e| format!("{:?}", e))?;
    meter.loudness_global().map_err(|e| format!("{:?}", e))
}
