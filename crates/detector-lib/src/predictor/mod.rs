//! Classification engine
//!
//! Validation, model lookup, scoring, ensemble voting and the auto-mode loop.

mod ensemble;
mod features;
mod inference;
mod orchestrator;
mod registry;
mod scheduler;
mod store;

pub use ensemble::{combine, Verdict, ATTACK_THRESHOLD};
pub use features::validate;
pub use inference::{LinearScorer, Link, OnnxScorer};
pub use orchestrator::{
    BatchOutcome, OrchestratorConfig, PredictionOrchestrator, DEFAULT_INFERENCE_TIMEOUT,
    DEFAULT_SAMPLE_TIMEOUT,
};
pub use registry::{ModelHandle, ModelInfo, ModelRegistry, Resolved};
pub use scheduler::{
    AutoModeScheduler, AutoModeState, AutoModeStatus, TickOutcome, DEFAULT_AUTO_INTERVAL,
};
pub use store::{ModelStore, FEATURE_NAMES_FILE};

use crate::models::FeatureVector;
use anyhow::Result;

/// Trait for classifier implementations
pub trait Scorer: Send + Sync {
    /// Probability that the flow is an attack, expected in [0, 1]
    fn score(&self, features: &FeatureVector) -> Result<f64>;

    /// Short name of the backing implementation
    fn kind(&self) -> &'static str;
}
