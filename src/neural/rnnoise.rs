//! RNNoise denoiser via `nnnoiseless`
//!
//! RNNoise runs on 480-sample frames at 48 kHz with samples in the 16-bit
//! integer range, so input is resampled and rescaled around the model call.

use nnnoiseless::DenoiseState;
use tracing::debug;

use super::model::{blend, DenoiseModel};
use crate::engine::{resample, AudioBuffer};
use crate::error::{EnhanceError, Result};

const FRAME_SIZE: usize = nnnoiseless::FRAME_SIZE;
const MODEL_SAMPLE_RATE: u32 = 48000;
const I16_SCALE: f32 = 32768.0;

/// RNNoise-backed denoise model
#[derive(Debug, Default)]
pub struct RnnoiseModel;

impl RnnoiseModel {
    pub fn new() -> Self {
        Self
    }

    fn denoise_channel(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        let at_model_rate =
            resample(samples, sample_rate, MODEL_SAMPLE_RATE).map_err(|e| model_failed(&e))?;

        let mut state = DenoiseState::new();
        let mut output = Vec::with_capacity(at_model_rate.len());
        let mut input_frame = [0.0_f32; FRAME_SIZE];
        let mut output_frame = [0.0_f32; FRAME_SIZE];

        for chunk in at_model_rate.chunks(FRAME_SIZE) {
            input_frame.fill(0.0);
            for (slot, &s) in input_frame.iter_mut().zip(chunk) {
                *slot = s * I16_SCALE;
            }
            state.process_frame(&mut output_frame, &input_frame);
            output.extend(output_frame[..chunk.len()].iter().map(|s| s / I16_SCALE));
        }

        let mut restored =
            resample(&output, MODEL_SAMPLE_RATE, sample_rate).map_err(|e| model_failed(&e))?;
        restored.resize(samples.len(), 0.0);
        Ok(restored)
    }
}

fn model_failed(err: &EnhanceError) -> EnhanceError {
    EnhanceError::ModelFailed {
        model: "rnnoise".to_string(),
        reason: err.to_string(),
    }
}

impl DenoiseModel for RnnoiseModel {
    fn name(&self) -> &str {
        "rnnoise"
    }

    fn denoise(&mut self, input: &AudioBuffer, strength: f32) -> Result<AudioBuffer> {
        if !(0.0..=1.0).contains(&strength) {
            return Err(EnhanceError::InvalidParameter {
                param: "strength".to_string(),
                value: strength.to_string(),
                expected: "0.0 to 1.0".to_string(),
            });
        }
        if strength == 0.0 || input.is_empty() {
            return Ok(input.clone());
        }

        debug!(
            "rnnoise: {} channel(s), {} frames at {} Hz",
            input.channels(),
            input.len(),
            input.sample_rate()
        );

        let channels = input
            .channel_data()
            .iter()
            .map(|ch| {
                let denoised = self.denoise_channel(ch, input.sample_rate())?;
                Ok(blend(ch, &denoised, strength))
            })
            .collect::<Result<Vec<_>>>()?;
        input.with_samples(channels)
    }
}
