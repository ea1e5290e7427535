//! Core library for network intrusion detection
//!
//! This crate provides the core functionality for:
//! - Feature validation and model scoring (ONNX and linear classifiers)
//! - Ensemble voting across the loaded classifiers
//! - Rolling analytics and an operator activity log
//! - The auto-mode sampling loop
//! - Health checks and observability

pub mod analytics;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod sample;

pub use error::{
    ErrorCategory, PredictionError, RegistryError, SampleError, SchedulerError, ValidationError,
};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DetectorMetrics, StructuredLogger};
