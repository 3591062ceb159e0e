//! Decision Engine
//!
//! Maps measured quality (plus any user override) to a processing level,
//! a concrete [`EnhancementConfig`] and the stage plan.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stage::{PlannedStage, StageName};
use crate::analysis::QualityMetrics;
use crate::config::{EnhancementConfig, QualityLevel};
use crate::error::Result;

/// Score boundaries between processing levels
pub mod levels {
    /// At or above: minimal processing
    pub const MINIMAL_SCORE: f64 = 0.9;
    /// Above: light processing
    pub const LIGHT_SCORE: f64 = 0.8;
    /// At or above: standard processing; below: aggressive
    pub const STANDARD_SCORE: f64 = 0.5;
    /// Standard level uses AI only below this SNR
    pub const STANDARD_AI_SNR_DB: f64 = 20.0;
}

/// Choices the user made on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UserOverride {
    /// Fixed level instead of automatic selection
    pub level: Option<QualityLevel>,
    pub disable_ai: bool,
    pub preserve_dynamics: Option<bool>,
    pub target_loudness_lufs: Option<f32>,
}

impl UserOverride {
    pub fn with_level(mut self, level: QualityLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn without_ai(mut self) -> Self {
        self.disable_ai = true;
        self
    }

    pub fn with_preserve_dynamics(mut self, preserve: bool) -> Self {
        self.preserve_dynamics = Some(preserve);
        self
    }

    pub fn with_target_loudness(mut self, lufs: f32) -> Self {
        self.target_loudness_lufs = Some(lufs);
        self
    }
}

/// Output of the decision engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub config: EnhancementConfig,
    pub stages: Vec<PlannedStage>,
    /// Level actually used
    pub quality_level: QualityLevel,
    /// Level the metrics alone would have chosen
    pub recommended_level: QualityLevel,
    /// True when user input changed the automatic choice
    pub overridden: bool,
    pub reasoning: Vec<String>,
}

/// Level recommended for `metrics`, without user input
pub fn recommend_level(metrics: &QualityMetrics) -> QualityLevel {
    let score = metrics.quality_score;
    if score >= levels::MINIMAL_SCORE {
        QualityLevel::Minimal
    } else if score > levels::LIGHT_SCORE {
        QualityLevel::Light
    } else if score >= levels::STANDARD_SCORE {
        QualityLevel::Standard
    } else {
        QualityLevel::Aggressive
    }
}

/// Preset for `level` with AI kept only when the metrics call for it
///
/// Applies to user-selected levels too, so a forced level never runs the
/// model on audio that is already clean.
fn level_config(level: QualityLevel, metrics: &QualityMetrics) -> EnhancementConfig {
    let preset = EnhancementConfig::preset(level);
    let wants_ai = match level {
        QualityLevel::Standard => metrics.snr_db < levels::STANDARD_AI_SNR_DB,
        _ => metrics.needs_ai_enhancement(),
    };
    if preset.ai_enhancement_enabled() && !wants_ai {
        preset
            .to_builder()
            .ai_enhancement_enabled(false)
            .build()
            .unwrap_or(preset)
    } else {
        preset
    }
}

/// Stage plan for a config; always all three stages, in order
pub fn plan_stages(config: &EnhancementConfig) -> Vec<PlannedStage> {
    StageName::ALL
        .iter()
        .map(|&name| {
            let enabled = match name {
                StageName::NoiseReduction => true,
                StageName::Spectral => config.eq_enabled(),
                StageName::Dynamics => config.dynamics_enabled(),
            };
            PlannedStage::new(name, enabled)
        })
        .collect()
}

/// Pick the configuration and stage plan for a buffer with `metrics`
///
/// Fails with `InvalidParameter` when an override is out of range.
pub fn select_config(metrics: &QualityMetrics, overrides: &UserOverride) -> Result<Decision> {
    let recommended_level = recommend_level(metrics);
    let recommended = level_config(recommended_level, metrics);

    let mut reasoning = vec![format!(
        "quality score {:.3} ({}) recommends {} processing",
        metrics.quality_score,
        metrics.quality_label(),
        recommended_level
    )];

    let quality_level = overrides.level.unwrap_or(recommended_level);
    let mut builder = match overrides.level {
        Some(level) => {
            reasoning.push(format!("user selected {} processing", level));
            let config = level_config(level, metrics);
            if EnhancementConfig::preset(level).ai_enhancement_enabled()
                && !config.ai_enhancement_enabled()
            {
                reasoning.push(format!(
                    "SNR {:.1} dB is clean enough to skip AI noise reduction",
                    metrics.snr_db
                ));
            }
            config.to_builder()
        }
        None => {
            if recommended.ai_enhancement_enabled() {
                reasoning.push(format!(
                    "SNR {:.1} dB suggests AI noise reduction",
                    metrics.snr_db
                ));
            }
            recommended.to_builder()
        }
    };

    if overrides.disable_ai {
        reasoning.push("AI noise reduction disabled by user".to_string());
        builder = builder.ai_enhancement_enabled(false);
    }
    if let Some(preserve) = overrides.preserve_dynamics {
        builder = builder.preserve_dynamics(preserve);
    }
    if let Some(lufs) = overrides.target_loudness_lufs {
        builder = builder.target_loudness_lufs(lufs);
    }
    let config = builder.build()?;

    let overridden = quality_level != recommended_level
        || config.ai_enhancement_enabled() != recommended.ai_enhancement_enabled();

    debug!(
        "decision: level={} recommended={} ai={} strength={}",
        quality_level,
        recommended_level,
        config.ai_enhancement_enabled(),
        config.noise_reduction_strength()
    );

    Ok(Decision {
        stages: plan_stages(&config),
        config,
        quality_level,
        recommended_level,
        overridden,
        reasoning,
    })
}
