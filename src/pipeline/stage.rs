//! Stage identifiers and per-stage records

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Processing stages, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    NoiseReduction,
    Spectral,
    Dynamics,
}

impl StageName {
    /// Every stage, in execution order
    pub const ALL: [StageName; 3] = [
        StageName::NoiseReduction,
        StageName::Spectral,
        StageName::Dynamics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::NoiseReduction => "noise_reduction",
            StageName::Spectral => "spectral",
            StageName::Dynamics => "dynamics",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the stage list chosen by the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    pub name: StageName,
    pub enabled: bool,
}

impl PlannedStage {
    pub fn new(name: StageName, enabled: bool) -> Self {
        Self { name, enabled }
    }
}

/// Stage parameters as reported in results
pub type StageParameters = BTreeMap<String, serde_json::Value>;

/// What happened in one stage of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub name: StageName,
    pub enabled: bool,
    /// Whether the stage did any processing
    pub ran: bool,
    /// Method actually used (`"ai"`, `"spectral_gating"`, `"eq"`, ...)
    pub method: String,
    pub parameters: StageParameters,
    pub duration_secs: f64,
    /// Set when a preferred method failed and a fallback was used
    pub fallback_reason: Option<String>,
    pub output_fingerprint: Option<String>,
}

impl StageResult {
    pub fn new(name: StageName, method: impl Into<String>) -> Self {
        Self {
            name,
            enabled: true,
            ran: true,
            method: method.into(),
            parameters: BTreeMap::new(),
            duration_secs: 0.0,
            fallback_reason: None,
            output_fingerprint: None,
        }
    }

    /// Record for a stage the plan disabled
    pub fn disabled(name: StageName, fingerprint: String) -> Self {
        Self {
            enabled: false,
            ran: false,
            output_fingerprint: Some(fingerprint),
            ..Self::new(name, "none")
        }
    }

    /// Record for a stage that aborted the run
    pub fn failed(name: StageName, reason: &str) -> Self {
        let mut result = Self {
            ran: false,
            ..Self::new(name, "failed")
        };
        result
            .parameters
            .insert("error".to_string(), serde_json::Value::from(reason));
        result
    }

    pub fn with_parameters(mut self, parameters: StageParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}
