//! Model provider
//!
//! Owns the (optional) AI denoise model and hands it out one caller at a
//! time. A provider is created once per process and shared through `Arc`
//! by every pipeline run, including concurrent batch workers.

use std::sync::Mutex;

use tracing::{debug, info};

use super::model::DenoiseModel;
use crate::config::Settings;
use crate::engine::AudioBuffer;
use crate::error::{EnhanceError, Result};

enum Availability {
    Ready {
        name: String,
        model: Mutex<Box<dyn DenoiseModel>>,
    },
    Unavailable(String),
}

/// Shared access point for the AI denoise model
pub struct ModelProvider {
    availability: Availability,
}

impl std::fmt::Debug for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.availability {
            Availability::Ready { name, .. } => write!(f, "ModelProvider(ready: {})", name),
            Availability::Unavailable(reason) => {
                write!(f, "ModelProvider(unavailable: {})", reason)
            }
        }
    }
}

impl ModelProvider {
    /// A provider that wraps `model`
    pub fn with_model(model: Box<dyn DenoiseModel>) -> Self {
        Self {
            availability: Availability::Ready {
                name: model.name().to_string(),
                model: Mutex::new(model),
            },
        }
    }

    /// A provider with no model; every call reports `ModelUnavailable`
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            availability: Availability::Unavailable(reason.into()),
        }
    }

    /// Build the provider described by process settings
    pub fn from_settings(settings: &Settings) -> Self {
        if !settings.ai_enabled {
            return Self::unavailable("AI processing disabled by configuration");
        }

        if let Some(dir) = &settings.model_path {
            if !dir.is_dir() {
                return Self::unavailable(format!(
                    "model directory {} does not exist",
                    dir.display()
                ));
            }
            debug!("model directory: {}", dir.display());
        }

        Self::builtin()
    }

    #[cfg(feature = "rnnoise")]
    fn builtin() -> Self {
        info!("AI denoiser ready (rnnoise)");
        Self::with_model(Box::new(super::rnnoise::RnnoiseModel::new()))
    }

    #[cfg(not(feature = "rnnoise"))]
    fn builtin() -> Self {
        info!("AI denoiser not compiled in");
        Self::unavailable("built without the rnnoise feature")
    }

    pub fn is_available(&self) -> bool {
        matches!(self.availability, Availability::Ready { .. })
    }

    /// Why the model cannot be used, if it cannot
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.availability {
            Availability::Ready { .. } => None,
            Availability::Unavailable(reason) => Some(reason),
        }
    }

    pub fn model_name(&self) -> Option<&str> {
        match &self.availability {
            Availability::Ready { name, .. } => Some(name),
            Availability::Unavailable(_) => None,
        }
    }

    /// Run the model on `input`
    ///
    /// Inference is single-flight: concurrent callers wait for the lock.
    /// Output that changes shape or contains non-finite samples is reported
    /// as `ModelFailed`.
    pub fn denoise(&self, input: &AudioBuffer, strength: f32) -> Result<AudioBuffer> {
        let (name, model) = match &self.availability {
            Availability::Ready { name, model } => (name, model),
            Availability::Unavailable(reason) => {
                return Err(EnhanceError::ModelUnavailable {
                    reason: reason.clone(),
                })
            }
        };

        let failed = |reason: String| EnhanceError::ModelFailed {
            model: name.clone(),
            reason,
        };

        let output = {
            let mut guard = model
                .lock()
                .map_err(|_| failed("model lock poisoned by an earlier panic".to_string()))?;
            guard.denoise(input, strength)?
        };

        if output.channels() != input.channels()
            || output.len() != input.len()
            || output.sample_rate() != input.sample_rate()
        {
            return Err(failed(format!(
                "output shape {}x{}@{} does not match input {}x{}@{}",
                output.channels(),
                output.len(),
                output.sample_rate(),
                input.channels(),
                input.len(),
                input.sample_rate()
            )));
        }
        if !output.is_finite() {
            return Err(failed("output contains NaN or infinite samples".to_string()));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use crate::neural::mock::{AttenuatingModel, FailingModel};
    use std::path::PathBuf;
    use std::sync::Arc;

    struct NanModel;

    impl DenoiseModel for NanModel {
        fn name(&self) -> &str {
            "nan"
        }

        fn denoise(&mut self, input: &AudioBuffer, _strength: f32) -> Result<AudioBuffer> {
            input.scaled(f32::NAN)
        }
    }

    fn tone() -> AudioBuffer {
        generate_test_tone(440.0, 0.5, 0.1, 16000).unwrap()
    }

    #[test]
    fn test_unavailable_provider() {
        let provider = ModelProvider::unavailable("no model");
        assert!(!provider.is_available());
        assert_eq!(provider.unavailable_reason(), Some("no model"));
        assert!(matches!(
            provider.denoise(&tone(), 0.5),
            Err(EnhanceError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn test_model_errors_pass_through() {
        let provider = ModelProvider::with_model(Box::new(FailingModel::default()));
        assert!(provider.is_available());
        assert!(matches!(
            provider.denoise(&tone(), 0.5),
            Err(EnhanceError::ModelFailed { .. })
        ));
    }

    #[test]
    fn test_non_finite_output_rejected() {
        let provider = ModelProvider::with_model(Box::new(NanModel));
        let err = provider.denoise(&tone(), 0.5).unwrap_err();
        assert!(matches!(err, EnhanceError::ModelFailed { ref model, .. } if model == "nan"));
    }

    #[test]
    fn test_disabled_by_settings() {
        let settings = Settings {
            ai_enabled: false,
            ..Settings::default()
        };
        assert!(!ModelProvider::from_settings(&settings).is_available());
    }

    #[test]
    fn test_missing_model_dir() {
        let settings = Settings {
            model_path: Some(PathBuf::from("/definitely/not/a/model/dir")),
            ..Settings::default()
        };
        let provider = ModelProvider::from_settings(&settings);
        assert!(!provider.is_available());
        assert!(provider.unavailable_reason().unwrap().contains("does not exist"));
    }

    #[test]
    fn test_shared_across_threads() {
        let provider = Arc::new(ModelProvider::with_model(Box::new(
            AttenuatingModel::passthrough(),
        )));
        let input = tone();
        std::thread::scope(|s| {
            for _ in 0..4 {
                let provider = Arc::clone(&provider);
                let input = &input;
                s.spawn(move || {
                    assert_eq!(&provider.denoise(input, 1.0).unwrap(), input);
                });
            }
        });
    }
}
