//! Quality-Adaptive Enhancement Pipeline
//!
//! ```text
//! analyze -> decide -> noise reduction -> spectral -> dynamics -> validate
//! ```
//!
//! - [`decision`]: quality score to level, config and stage plan
//! - [`noise_reduction`]: AI with spectral-gating fallback
//! - [`spectral`]: tonal shaping with headroom protection
//! - [`dynamics`]: compression, loudness normalization, limiting
//! - [`validator`]: accept, warn or roll back
//! - [`orchestrator`]: runs it all and records the outcome

pub mod decision;
pub mod dynamics;
pub mod events;
pub mod noise_reduction;
pub mod orchestrator;
pub mod result;
pub mod spectral;
pub mod stage;
pub mod validator;

pub use decision::{select_config, Decision, UserOverride};
pub use events::{StageEvent, StageObserver};
pub use noise_reduction::{reduce_noise, NoiseMethod, NrState};
pub use orchestrator::Pipeline;
pub use result::{EnhancementOutcome, ProcessingResult};
pub use stage::{PlannedStage, StageName, StageResult};
pub use validator::{validate, validate_with_fallback, Validation, Verdict};
