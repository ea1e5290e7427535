//! Observability infrastructure for the detector
//!
//! Provides:
//! - Prometheus metrics (prediction latency, verdict counts, errors, auto mode)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct DetectorMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    auto_mode_running: IntGauge,
    auto_ticks_total: IntCounter,
    auto_tick_failures_total: IntCounter,
    history_size: IntGauge,
    models_loaded: IntGauge,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "intrusion_detector_prediction_latency_seconds",
                "Time spent validating and scoring a prediction",
                &["model"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "intrusion_detector_predictions_total",
                "Predictions recorded, by model and verdict",
                &["model", "label"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "intrusion_detector_prediction_errors_total",
                "Failed predictions, by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            auto_mode_running: register_int_gauge!(
                "intrusion_detector_auto_mode_running",
                "1 while auto mode is generating predictions"
            )
            .expect("Failed to register auto_mode_running"),

            auto_ticks_total: register_int_counter!(
                "intrusion_detector_auto_ticks_total",
                "Auto mode ticks started"
            )
            .expect("Failed to register auto_ticks_total"),

            auto_tick_failures_total: register_int_counter!(
                "intrusion_detector_auto_tick_failures_total",
                "Auto mode ticks that failed to produce a prediction"
            )
            .expect("Failed to register auto_tick_failures_total"),

            history_size: register_int_gauge!(
                "intrusion_detector_history_size",
                "Predictions currently held in the rolling history"
            )
            .expect("Failed to register history_size"),

            models_loaded: register_int_gauge!(
                "intrusion_detector_models_loaded",
                "Number of classifiers loaded into the registry"
            )
            .expect("Failed to register models_loaded"),
        }
    }
}

/// Detector metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, model: &str, elapsed: Duration) {
        self.inner()
            .prediction_latency_seconds
            .with_label_values(&[model])
            .observe(elapsed.as_secs_f64());
    }

    pub fn inc_predictions(&self, model: &str, label: &str) {
        self.inner()
            .predictions_total
            .with_label_values(&[model, label])
            .inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    pub fn set_auto_mode_running(&self, running: bool) {
        self.inner().auto_mode_running.set(i64::from(running));
    }

    pub fn inc_auto_ticks(&self) {
        self.inner().auto_ticks_total.inc();
    }

    pub fn inc_auto_tick_failures(&self) {
        self.inner().auto_tick_failures_total.inc();
    }

    pub fn set_history_size(&self, size: usize) {
        self.inner().history_size.set(size as i64);
    }

    pub fn set_models_loaded(&self, count: usize) {
        self.inner().models_loaded.set(count as i64);
    }
}

/// Structured logger for detector events
///
/// Provides consistent JSON-formatted logging for predictions,
/// auto mode transitions, and other significant events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a recorded prediction
    pub fn log_prediction(&self, sequence: u64, model: &str, label: &str, confidence: f64) {
        info!(
            event = "prediction_recorded",
            instance = %self.instance,
            sequence = sequence,
            model = %model,
            label = %label,
            confidence = confidence,
            "Prediction recorded"
        );
    }

    /// Log a prediction that could not be produced
    pub fn log_prediction_failure(&self, model: &str, kind: &str, error: &str) {
        warn!(
            event = "prediction_failed",
            instance = %self.instance,
            model = %model,
            kind = %kind,
            error = %error,
            "Prediction failed"
        );
    }

    pub fn log_models_loaded(&self, models: &[String], features: usize) {
        info!(
            event = "models_loaded",
            instance = %self.instance,
            models = ?models,
            features = features,
            "Classifiers loaded"
        );
    }

    pub fn log_auto_started(&self, model: &str, interval: Duration) {
        info!(
            event = "auto_mode_started",
            instance = %self.instance,
            model = %model,
            interval_ms = interval.as_millis() as u64,
            "Auto mode started"
        );
    }

    pub fn log_auto_stopped(&self, ticks: u64, failures: u64) {
        info!(
            event = "auto_mode_stopped",
            instance = %self.instance,
            ticks = ticks,
            failures = failures,
            "Auto mode stopped"
        );
    }

    pub fn log_tick_failure(&self, tick: u64, model: &str, kind: &str, error: &str) {
        warn!(
            event = "auto_tick_failed",
            instance = %self.instance,
            tick = tick,
            model = %model,
            kind = %kind,
            error = %error,
            "Auto mode tick failed, continuing"
        );
    }

    pub fn log_startup(&self, version: &str, models_ready: bool) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            models_ready = models_ready,
            "Intrusion detector started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Intrusion detector shutting down"
        );
    }
}
