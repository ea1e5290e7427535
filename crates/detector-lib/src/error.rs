//! Error taxonomy for prediction, scheduling and sample sourcing

use crate::models::ModelId;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Broad class of a failure, used to decide how loudly it is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// The caller sent something unusable
    Input,
    /// The service is not correctly provisioned
    Configuration,
    /// The operation conflicts with current state
    State,
    /// A collaborator (model, sample source) failed
    Upstream,
}

/// Feature map rejected against a model schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    #[error("non-numeric or non-finite feature values: {}", .0.join(", "))]
    NonNumeric(Vec<String>),
}

/// Failure to produce a raw feature map
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("sample source exhausted after {rows} rows")]
    Exhausted { rows: usize },

    #[error("no sample source configured")]
    Unavailable,

    #[error("dataset contains no rows")]
    Empty,

    #[error("failed to read dataset: {0}")]
    Io(String),

    #[error("malformed dataset at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Failure of a single prediction
#[derive(Debug, Clone, Error)]
pub enum PredictionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unknown model '{requested}', available: {}", .available.join(", "))]
    UnknownModel {
        requested: String,
        available: Vec<String>,
    },

    #[error("models are not loaded yet")]
    ModelsNotLoaded,

    #[error("ensemble received no model scores")]
    EmptyEnsemble,

    #[error("model {model} failed to score: {message}")]
    Scoring { model: ModelId, message: String },

    #[error("{operation} timed out after {}ms", .timeout.as_millis())]
    UpstreamTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PredictionError {
    /// Build an unknown-model error listing what can be requested instead
    pub fn unknown_model(requested: &str, available: impl IntoIterator<Item = ModelId>) -> Self {
        let mut names: Vec<String> = available
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect();
        names.push(crate::models::ENSEMBLE_ID.to_string());
        PredictionError::UnknownModel {
            requested: requested.to_string(),
            available: names,
        }
    }

    /// Stable snake_case identifier for metrics labels and API error codes
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Validation(ValidationError::MissingFeatures(_)) => "missing_feature",
            PredictionError::Validation(ValidationError::NonNumeric(_)) => "invalid_feature_type",
            PredictionError::UnknownModel { .. } => "unknown_model",
            PredictionError::ModelsNotLoaded => "models_not_loaded",
            PredictionError::EmptyEnsemble => "empty_ensemble",
            PredictionError::Scoring { .. } => "scoring_failed",
            PredictionError::UpstreamTimeout { .. } => "upstream_timeout",
            PredictionError::Sample(SampleError::Exhausted { .. }) => "sample_exhausted",
            PredictionError::Sample(_) => "sample_unavailable",
            PredictionError::Internal(_) => "internal",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PredictionError::Validation(_) => ErrorCategory::Input,
            PredictionError::UnknownModel { .. }
            | PredictionError::ModelsNotLoaded
            | PredictionError::EmptyEnsemble => ErrorCategory::Configuration,
            PredictionError::Scoring { .. }
            | PredictionError::UpstreamTimeout { .. }
            | PredictionError::Sample(_)
            | PredictionError::Internal(_) => ErrorCategory::Upstream,
        }
    }
}

/// Auto-mode state transition rejected
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("auto mode already running with model {model_id} every {}ms; stop it first", .interval.as_millis())]
    AlreadyRunning { model_id: String, interval: Duration },

    #[error("auto mode interval must be greater than zero")]
    InvalidInterval,

    #[error(transparent)]
    Rejected(#[from] PredictionError),
}

impl SchedulerError {
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::AlreadyRunning { .. } => "already_running",
            SchedulerError::InvalidInterval => "invalid_interval",
            SchedulerError::Rejected(e) => e.kind(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SchedulerError::AlreadyRunning { .. } => ErrorCategory::State,
            SchedulerError::InvalidInterval => ErrorCategory::Input,
            SchedulerError::Rejected(e) => e.category(),
        }
    }
}

/// Model registry could not accept a set of handles
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("models are already loaded")]
    AlreadyLoaded,

    #[error("at least one model is required")]
    NoModels,

    #[error("model {0} supplied more than once")]
    Duplicate(ModelId),

    #[error("model {model} expects {actual} features but the registry schema has {expected}")]
    SchemaMismatch {
        model: ModelId,
        expected: usize,
        actual: usize,
    },
}
