//! Noise Reduction Stage
//!
//! Tries the AI model first when the config asks for it and falls back to
//! spectral gating when the model is missing or fails. The path taken is
//! recorded as an explicit list of state transitions:
//!
//! ```text
//! AttemptAi -> Done(Ai)
//! AttemptAi -> FallbackSpectralGating -> Done(SpectralGating | None)
//! SpectralGating -> Done(SpectralGating | None)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::stage::StageParameters;
use crate::config::EnhancementConfig;
use crate::dsp::{GateParams, Processor, SpectralGate};
use crate::engine::AudioBuffer;
use crate::error::Result;
use crate::neural::ModelProvider;

/// Method that produced the stage output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMethod {
    Ai,
    SpectralGating,
    /// Both paths failed; input returned unchanged
    None,
}

impl NoiseMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseMethod::Ai => "ai",
            NoiseMethod::SpectralGating => "spectral_gating",
            NoiseMethod::None => "none",
        }
    }
}

impl fmt::Display for NoiseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of one noise-reduction invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NrState {
    AttemptAi,
    /// AI was requested but could not be used
    FallbackSpectralGating,
    /// AI was not requested
    SpectralGating,
    Done(NoiseMethod),
}

#[derive(Debug, Clone)]
pub struct NoiseReductionOutcome {
    pub buffer: AudioBuffer,
    pub method: NoiseMethod,
    /// Every state visited, starting with the initial one
    pub transitions: Vec<NrState>,
    pub fallback_reason: Option<String>,
    pub parameters: StageParameters,
}

impl NoiseReductionOutcome {
    pub fn fallback_occurred(&self) -> bool {
        self.transitions.contains(&NrState::FallbackSpectralGating)
    }
}

/// Reduce noise in `input`; never fails
pub fn reduce_noise(
    input: &AudioBuffer,
    config: &EnhancementConfig,
    provider: &ModelProvider,
) -> NoiseReductionOutcome {
    let strength = config.noise_reduction_strength();
    let mut parameters = StageParameters::new();
    parameters.insert("strength".to_string(), Value::from(strength));

    let mut state = if config.ai_enhancement_enabled() {
        NrState::AttemptAi
    } else {
        NrState::SpectralGating
    };
    let mut transitions = vec![state];
    let mut buffer = None;
    let mut fallback_reason = None;

    let method = loop {
        state = match state {
            NrState::AttemptAi => match provider.denoise(input, strength) {
                Ok(denoised) => {
                    if let Some(name) = provider.model_name() {
                        parameters.insert("model".to_string(), Value::from(name));
                    }
                    buffer = Some(denoised);
                    NrState::Done(NoiseMethod::Ai)
                }
                Err(e) => {
                    warn!("AI noise reduction unavailable, falling back to spectral gating: {}", e);
                    parameters.insert("ai_error".to_string(), Value::from(e.to_string()));
                    fallback_reason = Some(e.to_string());
                    NrState::FallbackSpectralGating
                }
            },
            NrState::FallbackSpectralGating | NrState::SpectralGating => {
                match spectral_gate(input, strength) {
                    Ok((gated, gate_params)) => {
                        parameters.insert("gate".to_string(), gate_params);
                        buffer = Some(gated);
                        NrState::Done(NoiseMethod::SpectralGating)
                    }
                    Err(e) => {
                        warn!("spectral gating failed, leaving audio unchanged: {}", e);
                        parameters.insert("gate_error".to_string(), Value::from(e.to_string()));
                        NrState::Done(NoiseMethod::None)
                    }
                }
            }
            NrState::Done(method) => break method,
        };
        transitions.push(state);
    };

    debug!("noise reduction: method={} transitions={:?}", method, transitions);

    NoiseReductionOutcome {
        buffer: buffer.unwrap_or_else(|| input.clone()),
        method,
        transitions,
        fallback_reason,
        parameters,
    }
}

fn spectral_gate(input: &AudioBuffer, strength: f32) -> Result<(AudioBuffer, Value)> {
    let mut gate = SpectralGate::new(GateParams::with_strength(strength))?;
    let output = gate.process(input)?;
    Ok((output, gate.parameters()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityLevel;
    use crate::engine::generate_test_tone;
    use crate::neural::mock::{AttenuatingModel, FailingModel};

    fn ai_config() -> EnhancementConfig {
        EnhancementConfig::preset(QualityLevel::Standard)
    }

    fn tone() -> AudioBuffer {
        generate_test_tone(440.0, 0.5, 0.5, 16000).unwrap()
    }

    #[test]
    fn test_ai_success_path() {
        let provider = ModelProvider::with_model(Box::new(AttenuatingModel::new(3.0)));
        let outcome = reduce_noise(&tone(), &ai_config(), &provider);
        assert_eq!(outcome.method, NoiseMethod::Ai);
        assert_eq!(
            outcome.transitions,
            vec![NrState::AttemptAi, NrState::Done(NoiseMethod::Ai)]
        );
        assert!(!outcome.fallback_occurred());
        assert_eq!(outcome.parameters["model"], "mock-attenuating");
    }

    #[test]
    fn test_model_failure_falls_back() {
        let provider = ModelProvider::with_model(Box::new(FailingModel::default()));
        let outcome = reduce_noise(&tone(), &ai_config(), &provider);
        assert_eq!(outcome.method, NoiseMethod::SpectralGating);
        assert_eq!(
            outcome.transitions,
            vec![
                NrState::AttemptAi,
                NrState::FallbackSpectralGating,
                NrState::Done(NoiseMethod::SpectralGating)
            ]
        );
        assert!(outcome.fallback_occurred());
        assert!(outcome.fallback_reason.unwrap().contains("simulated"));
    }

    #[test]
    fn test_ai_disabled_goes_straight_to_gating() {
        let provider = ModelProvider::with_model(Box::new(AttenuatingModel::new(3.0)));
        let config = ai_config().to_builder().ai_enhancement_enabled(false).build().unwrap();
        let outcome = reduce_noise(&tone(), &config, &provider);
        assert_eq!(outcome.method, NoiseMethod::SpectralGating);
        assert_eq!(
            outcome.transitions,
            vec![NrState::SpectralGating, NrState::Done(NoiseMethod::SpectralGating)]
        );
        assert!(outcome.fallback_reason.is_none());
        assert!(!outcome.parameters.contains_key("model"));
    }

    #[test]
    fn test_both_paths_failing_returns_input() {
        let input = AudioBuffer::from_channels(vec![vec![0.1, f32::INFINITY, 0.1]], 16000).unwrap();
        let provider = ModelProvider::unavailable("none installed");
        let outcome = reduce_noise(&input, &ai_config(), &provider);
        assert_eq!(outcome.method, NoiseMethod::None);
        assert_eq!(outcome.buffer, input);
        assert!(outcome.parameters.contains_key("gate_error"));
        assert!(outcome.fallback_occurred());
    }

    #[test]
    fn test_method_strings() {
        assert_eq!(NoiseMethod::SpectralGating.to_string(), "spectral_gating");
        assert_eq!(serde_json::to_string(&NoiseMethod::Ai).unwrap(), "\"ai\"");
    }
}
