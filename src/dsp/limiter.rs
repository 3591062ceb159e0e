//! Peak limiter
//!
//! Guarantees that no output sample exceeds the ceiling.

use serde_json::json;

use super::Processor;
use crate::engine::{db_to_linear, linear_to_db, AudioBuffer};
use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Ceiling used after loudness normalization (dBFS)
pub const DEFAULT_CEILING_DB: f32 = -1.0;

const MIN_CEILING_DB: f32 = -12.0;
const MAX_CEILING_DB: f32 = 0.0;

/// Near-instant attack (0.1 ms)
const ATTACK_MS: f32 = 0.1;
const RELEASE_MS: f32 = 100.0;

#[inline]
fn time_to_coeff(time_ms: f32, sample_rate: u32) -> f32 {
    (-1.0 / (time_ms * sample_rate as f32 / 1000.0)).exp()
}

// ============================================================================
// Limiter
// ============================================================================

/// Linked brickwall limiter
#[derive(Debug, Clone)]
pub struct Limiter {
    ceiling_db: f32,
    ceiling_linear: f32,
    sample_rate: u32,
    /// Gain reduction envelope in dB (positive)
    envelope: f32,
    max_reduction_db: f32,
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING_DB)
    }
}

impl Limiter {
    /// Create a limiter; the ceiling is clamped to -12..0 dBFS
    pub fn new(ceiling_db: f32) -> Self {
        let ceiling_db = ceiling_db.clamp(MIN_CEILING_DB, MAX_CEILING_DB);
        Self {
            ceiling_db,
            ceiling_linear: db_to_linear(ceiling_db),
            sample_rate: 0,
            envelope: 0.0,
            max_reduction_db: 0.0,
        }
    }

    pub fn ceiling_db(&self) -> f32 {
        self.ceiling_db
    }

    pub fn ceiling_linear(&self) -> f32 {
        self.ceiling_linear
    }

    /// Deepest gain reduction applied since construction (dB)
    pub fn max_reduction_db(&self) -> f32 {
        self.max_reduction_db
    }
}

impl Processor for Limiter {
    fn name(&self) -> &'static str {
        "limiter"
    }

    fn process(&mut self, input: &AudioBuffer) -> Result<AudioBuffer> {
        if self.sample_rate != input.sample_rate() {
            self.sample_rate = input.sample_rate();
            self.envelope = 0.0;
        }
        let attack = time_to_coeff(ATTACK_MS, self.sample_rate);
        let release = time_to_coeff(RELEASE_MS, self.sample_rate);

        let channels = input.channel_data();
        let mut output: Vec<Vec<f32>> = channels.iter().map(|ch| ch.to_vec()).collect();

        for i in 0..input.len() {
            let peak = channels.iter().map(|ch| ch[i].abs()).fold(0.0_f32, f32::max);

            let target = if peak > self.ceiling_linear {
                (linear_to_db(peak) - self.ceiling_db).max(0.0)
            } else {
                0.0
            };

            let coeff = if target > self.envelope { attack } else { release };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * target;
            self.max_reduction_db = self.max_reduction_db.max(self.envelope);

            let gain = db_to_linear(-self.envelope);
            for ch in output.iter_mut() {
                let s = ch[i] * gain;
                // Hard clamp so the ceiling holds even inside the attack
                ch[i] = s.clamp(-self.ceiling_linear, self.ceiling_linear);
            }
        }

        input.with_samples(output)
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "ceiling_db": self.ceiling_db,
            "attack_ms": ATTACK_MS,
            "release_ms": RELEASE_MS,
        })
    }
}
