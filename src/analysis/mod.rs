//! Quality Analysis Module
//!
//! Objective measurements of a buffer and the composite quality score that
//! drives every processing decision.

pub mod analyzer;
pub mod metrics;
pub mod spectrum;

pub use analyzer::analyze;
pub use metrics::{QualityLabel, QualityMetrics};
