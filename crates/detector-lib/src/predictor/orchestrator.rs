//! Prediction orchestration
//!
//! Resolves the requested model, validates the raw feature map against each
//! participating schema, scores off the async executor under a timeout and
//! records the verdict. A failed prediction is reported and never recorded.

use super::ensemble::{combine, Verdict};
use super::features::validate;
use super::registry::{ModelHandle, ModelRegistry, Resolved};
use crate::analytics::{detect_attack_types, ActivityLevel, ActivityLog, Aggregator};
use crate::error::{PredictionError, SampleError};
use crate::models::{FeatureVector, ModelId, PredictionRecord, PredictionResult, RawFeatureMap};
use crate::observability::{DetectorMetrics, StructuredLogger};
use crate::sample::SampleSource;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum time a single model may spend scoring
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_millis(250);

/// Maximum time allowed to draw one sample
pub const DEFAULT_SAMPLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Timed-out scoring calls a model may leave running before it is refused
pub const DEFAULT_MAX_STALLED_SCORERS: usize = 4;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub inference_timeout: Duration,
    pub sample_timeout: Duration,
    /// A blocking scorer cannot be cancelled, so a timed-out call keeps its
    /// pool thread until it returns. Past this many, the model is refused.
    pub max_stalled_scorers: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
            sample_timeout: DEFAULT_SAMPLE_TIMEOUT,
            max_stalled_scorers: DEFAULT_MAX_STALLED_SCORERS,
        }
    }
}

/// Per-row outcome of a batch prediction
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub row_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PredictionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl BatchOutcome {
    fn from_result(row_index: usize, result: Result<PredictionRecord, PredictionError>) -> Self {
        match result {
            Ok(record) => Self {
                row_index,
                result: Some(record),
                error: None,
                code: None,
            },
            Err(e) => Self {
                row_index,
                result: None,
                error: Some(e.to_string()),
                code: Some(e.kind()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }
}

/// Turns raw feature maps into recorded verdicts
pub struct PredictionOrchestrator {
    registry: Arc<ModelRegistry>,
    aggregator: Arc<Aggregator>,
    activity: Arc<ActivityLog>,
    sample_source: Option<Arc<dyn SampleSource>>,
    config: OrchestratorConfig,
    metrics: DetectorMetrics,
    logger: StructuredLogger,
}

impl PredictionOrchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        aggregator: Arc<Aggregator>,
        activity: Arc<ActivityLog>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            aggregator,
            activity,
            sample_source: None,
            config,
            metrics: DetectorMetrics::new(),
            logger: StructuredLogger::new("orchestrator"),
        }
    }

    /// Attach the source used by sample predictions and auto mode
    pub fn with_sample_source(mut self, source: Arc<dyn SampleSource>) -> Self {
        self.sample_source = Some(source);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    pub fn sample_source(&self) -> Option<&Arc<dyn SampleSource>> {
        self.sample_source.as_ref()
    }

    /// Classify one feature map and record the verdict
    pub async fn predict_once(
        &self,
        model_id: &str,
        raw: RawFeatureMap,
    ) -> Result<PredictionRecord, PredictionError> {
        let start = Instant::now();
        let result = match self.classify(model_id, &raw).await {
            Ok(result) => result,
            Err(e) => {
                self.report_failure(model_id, &e);
                return Err(e);
            }
        };

        let model = result.model_used.as_str();
        let label = result.label.to_string();
        self.metrics.observe_prediction_latency(model, start.elapsed());
        self.metrics.inc_predictions(model, &label);

        self.activity.push_prediction(&result);
        let record = self.aggregator.record(result);
        self.metrics.set_history_size(self.aggregator.history_len());
        self.logger
            .log_prediction(record.sequence, model, &label, record.result.confidence);

        Ok(record)
    }

    /// Draw a feature map from the sample source and classify it
    pub async fn predict_sample(&self, model_id: &str) -> Result<PredictionRecord, PredictionError> {
        let raw = match self.draw_sample().await {
            Ok(raw) => raw,
            Err(e) => {
                self.report_failure(model_id, &e);
                return Err(e);
            }
        };
        self.predict_once(model_id, raw).await
    }

    /// Classify every row, collecting per-row outcomes
    ///
    /// The model is resolved once up front; an unusable model fails the whole
    /// batch. Individual row failures are reported in their outcome.
    pub async fn predict_batch(
        &self,
        model_id: &str,
        rows: Vec<RawFeatureMap>,
    ) -> Result<Vec<BatchOutcome>, PredictionError> {
        if let Err(e) = self.registry.resolve(model_id) {
            self.report_failure(model_id, &e);
            return Err(e);
        }

        let mut outcomes = Vec::with_capacity(rows.len());
        for (row_index, raw) in rows.into_iter().enumerate() {
            let result = self.predict_once(model_id, raw).await;
            outcomes.push(BatchOutcome::from_result(row_index, result));
        }
        Ok(outcomes)
    }

    async fn classify(
        &self,
        model_id: &str,
        raw: &RawFeatureMap,
    ) -> Result<PredictionResult, PredictionError> {
        let resolved = self.registry.resolve(model_id)?;
        let selector = resolved.selector();

        let (verdict, attack_types) = match &resolved {
            Resolved::Single(handle) => {
                let features = validate(raw, handle.schema())?;
                let attack_types = detect_attack_types(&features);
                (
                    Verdict::from_probability(self.score(handle, features).await?),
                    attack_types,
                )
            }
            Resolved::Ensemble(handles) => {
                // Validate against every schema before any model runs
                let vectors = handles
                    .iter()
                    .map(|h| validate(raw, h.schema()))
                    .collect::<Result<Vec<_>, _>>()?;
                let attack_types = vectors
                    .first()
                    .map(detect_attack_types)
                    .unwrap_or_default();

                let mut scores: Vec<(ModelId, f64)> = Vec::with_capacity(handles.len());
                for (handle, features) in handles.iter().zip(vectors) {
                    scores.push((handle.id(), self.score(handle, features).await?));
                }
                debug!(scores = ?scores, "Ensemble scores");
                (combine(&scores)?, attack_types)
            }
        };

        Ok(PredictionResult::new(verdict.label, verdict.confidence, selector)
            .with_attack_types(attack_types))
    }

    async fn score(&self, handle: &ModelHandle, features: FeatureVector) -> Result<f64, PredictionError> {
        let model = handle.id();
        let stalled = handle.in_flight();
        if stalled >= self.config.max_stalled_scorers {
            warn!(model = %model, in_flight = stalled, "Refusing model with stalled scoring calls");
            return Err(PredictionError::Scoring {
                model,
                message: format!("{} earlier scoring calls still running", stalled),
            });
        }

        let guard = handle.begin_scoring();
        let worker = handle.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            worker.score(&features)
        });

        let probability = match tokio::time::timeout(self.config.inference_timeout, task).await {
            Err(_) => {
                return Err(PredictionError::UpstreamTimeout {
                    operation: "model scoring",
                    timeout: self.config.inference_timeout,
                })
            }
            Ok(Err(join_err)) => {
                return Err(PredictionError::Internal(format!(
                    "scoring task for {} aborted: {}",
                    model, join_err
                )))
            }
            Ok(Ok(Err(e))) => {
                return Err(PredictionError::Scoring {
                    model,
                    message: format!("{:#}", e),
                })
            }
            Ok(Ok(Ok(p))) => p,
        };

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(PredictionError::Scoring {
                model,
                message: format!("probability {} outside [0, 1]", probability),
            });
        }
        Ok(probability)
    }

    async fn draw_sample(&self) -> Result<RawFeatureMap, PredictionError> {
        let source = self
            .sample_source
            .clone()
            .ok_or(SampleError::Unavailable)?;
        let task = tokio::task::spawn_blocking(move || source.sample());

        match tokio::time::timeout(self.config.sample_timeout, task).await {
            Err(_) => Err(PredictionError::UpstreamTimeout {
                operation: "sample draw",
                timeout: self.config.sample_timeout,
            }),
            Ok(Err(join_err)) => Err(PredictionError::Internal(format!(
                "sample task aborted: {}",
                join_err
            ))),
            Ok(Ok(sample)) => Ok(sample?),
        }
    }

    fn report_failure(&self, model_id: &str, error: &PredictionError) {
        let kind = error.kind();
        self.metrics.inc_prediction_errors(kind);
        self.logger
            .log_prediction_failure(model_id, kind, &error.to_string());
        self.activity.push(
            ActivityLevel::Error,
            format!("Prediction with {} failed: {}", model_id, error),
        );
    }
}
