//! Configuration
//!
//! Two layers live here:
//! - [`Settings`]: process-level knobs read from the environment
//! - [`EnhancementConfig`]: the validated, immutable per-run processing config

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{EnhanceError, Result};

// ============================================================================
// Environment settings
// ============================================================================

/// Log filter directive (e.g. `debug`, `enhance_audio=trace`)
pub const ENV_LOG_LEVEL: &str = "ENHANCE_AUDIO_LOG_LEVEL";
/// Worker threads for batch processing
pub const ENV_WORKERS: &str = "ENHANCE_AUDIO_WORKERS";
/// `off` disables the neural denoiser for the whole process
pub const ENV_AI: &str = "ENHANCE_AUDIO_AI";
/// Location of model weights, reported in diagnostics
pub const ENV_MODEL_PATH: &str = "ENHANCE_AUDIO_MODEL_PATH";

/// Process-level settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: Option<String>,
    pub workers: usize,
    pub ai_enabled: bool,
    pub model_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: None,
            workers: default_workers(),
            ai_enabled: true,
            model_path: None,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        settings.log_level = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty());

        if let Some(raw) = lookup(ENV_WORKERS) {
            settings.workers = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(EnhanceError::InvalidParameter {
                        param: ENV_WORKERS.to_string(),
                        value: raw,
                        expected: "a positive integer".to_string(),
                    })
                }
            };
        }

        if let Some(raw) = lookup(ENV_AI) {
            settings.ai_enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "on" | "1" | "true" | "yes" => true,
                "off" | "0" | "false" | "no" => false,
                _ => {
                    return Err(EnhanceError::InvalidParameter {
                        param: ENV_AI.to_string(),
                        value: raw,
                        expected: "on or off".to_string(),
                    })
                }
            };
        }

        settings.model_path = lookup(ENV_MODEL_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(settings)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ============================================================================
// Quality levels
// ============================================================================

/// Processing intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Minimal,
    Light,
    Standard,
    Aggressive,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Minimal => "minimal",
            QualityLevel::Light => "light",
            QualityLevel::Standard => "standard",
            QualityLevel::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Enhancement config
// ============================================================================

/// Default integrated loudness target (streaming platforms)
pub const DEFAULT_TARGET_LUFS: f32 = -14.0;
pub const MIN_TARGET_LUFS: f32 = -60.0;
pub const MAX_TARGET_LUFS: f32 = 0.0;

/// Immutable processing configuration for one run
///
/// Only constructible through [`EnhancementConfig::builder`] or a preset, so
/// every instance holds in-range values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnhancementConfig {
    noise_reduction_strength: f32,
    eq_enabled: bool,
    dynamics_enabled: bool,
    ai_enhancement_enabled: bool,
    preserve_dynamics: bool,
    target_loudness_lufs: f32,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self::preset(QualityLevel::Standard)
    }
}

impl EnhancementConfig {
    pub fn builder() -> EnhancementConfigBuilder {
        EnhancementConfigBuilder::from(Self::preset(QualityLevel::Standard))
    }

    /// Start a builder from this config's values
    pub fn to_builder(&self) -> EnhancementConfigBuilder {
        EnhancementConfigBuilder::from(*self)
    }

    /// Preset configuration for a quality level
    pub fn preset(level: QualityLevel) -> Self {
        let (strength, eq, dynamics, ai, preserve) = match level {
            QualityLevel::Minimal => (0.1, false, false, false, true),
            QualityLevel::Light => (0.2, true, true, false, true),
            QualityLevel::Standard => (0.5, true, true, true, true),
            QualityLevel::Aggressive => (0.8, true, true, true, false),
        };
        Self {
            noise_reduction_strength: strength,
            eq_enabled: eq,
            dynamics_enabled: dynamics,
            ai_enhancement_enabled: ai,
            preserve_dynamics: preserve,
            target_loudness_lufs: DEFAULT_TARGET_LUFS,
        }
    }

    pub fn noise_reduction_strength(&self) -> f32 {
        self.noise_reduction_strength
    }

    pub fn eq_enabled(&self) -> bool {
        self.eq_enabled
    }

    pub fn dynamics_enabled(&self) -> bool {
        self.dynamics_enabled
    }

    pub fn ai_enhancement_enabled(&self) -> bool {
        self.ai_enhancement_enabled
    }

    pub fn preserve_dynamics(&self) -> bool {
        self.preserve_dynamics
    }

    pub fn target_loudness_lufs(&self) -> f32 {
        self.target_loudness_lufs
    }
}

/// Builder validating [`EnhancementConfig`] values at `build()`
#[derive(Debug, Clone)]
pub struct EnhancementConfigBuilder {
    noise_reduction_strength: f32,
    eq_enabled: bool,
    dynamics_enabled: bool,
    ai_enhancement_enabled: bool,
    preserve_dynamics: bool,
    target_loudness_lufs: f32,
}

impl From<EnhancementConfig> for EnhancementConfigBuilder {
    fn from(config: EnhancementConfig) -> Self {
        Self {
            noise_reduction_strength: config.noise_reduction_strength,
            eq_enabled: config.eq_enabled,
            dynamics_enabled: config.dynamics_enabled,
            ai_enhancement_enabled: config.ai_enhancement_enabled,
            preserve_dynamics: config.preserve_dynamics,
            target_loudness_lufs: config.target_loudness_lufs,
        }
    }
}

impl EnhancementConfigBuilder {
    pub fn noise_reduction_strength(mut self, strength: f32) -> Self {
        self.noise_reduction_strength = strength;
        self
    }

    pub fn eq_enabled(mut self, enabled: bool) -> Self {
        self.eq_enabled = enabled;
        self
    }

    pub fn dynamics_enabled(mut self, enabled: bool) -> Self {
        self.dynamics_enabled = enabled;
        self
    }

    pub fn ai_enhancement_enabled(mut self, enabled: bool) -> Self {
        self.ai_enhancement_enabled = enabled;
        self
    }

    pub fn preserve_dynamics(mut self, preserve: bool) -> Self {
        self.preserve_dynamics = preserve;
        self
    }

    pub fn target_loudness_lufs(mut self, lufs: f32) -> Self {
        self.target_loudness_lufs = lufs;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<EnhancementConfig> {
        if !(0.0..=1.0).contains(&self.noise_reduction_strength) {
            return Err(EnhanceError::InvalidParameter {
                param: "noise_reduction_strength".to_string(),
                value: self.noise_reduction_strength.to_string(),
                expected: "0.0 to 1.0".to_string(),
            });
        }
        if !(MIN_TARGET_LUFS..=MAX_TARGET_LUFS).contains(&self.target_loudness_lufs) {
            return Err(EnhanceError::InvalidParameter {
                param: "target_loudness_lufs".to_string(),
                value: self.target_loudness_lufs.to_string(),
                expected: "-60 to 0 LUFS".to_string(),
            });
        }

        Ok(EnhancementConfig {
            noise_reduction_strength: self.noise_reduction_strength,
            eq_enabled: self.eq_enabled,
            dynamics_enabled: self.dynamics_enabled,
            ai_enhancement_enabled: self.ai_enhancement_enabled,
            preserve_dynamics: self.preserve_dynamics,
            target_loudness_lufs: self.target_loudness_lufs,
        })
    }
}
