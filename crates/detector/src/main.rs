//! Intrusion detector - ensemble inference and live analytics service
//!
//! Loads the exported classifiers, serves predictions and analytics over
//! HTTP and optionally runs the auto-mode sampling loop.

use anyhow::Result;
use detector_lib::{
    analytics::{ActivityLevel, ActivityLog, Aggregator},
    health::{components, HealthRegistry},
    observability::{DetectorMetrics, StructuredLogger},
    predictor::{AutoModeScheduler, ModelRegistry, ModelStore, PredictionOrchestrator},
    sample::{CsvSampleSource, RandomSampleSource, SampleSource},
};
use ids_detector::{api, config::DetectorConfig};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DETECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting ids-detector");

    let config = DetectorConfig::load()?;
    info!(
        instance = %config.instance,
        model_dir = %config.model_dir.display(),
        "Detector configured"
    );

    let health_registry = HealthRegistry::with_detector_components().await;
    let metrics = DetectorMetrics::new();
    let logger = StructuredLogger::new(&config.instance);

    // A failed load leaves the API up but not ready
    let registry = Arc::new(ModelRegistry::new());
    match ModelStore::new(config.model_dir.clone()).load_into(&registry) {
        Ok(count) => {
            metrics.set_models_loaded(count);
            if let Some(info) = registry.info() {
                logger.log_models_loaded(&info.available_models, info.feature_count);
            }
            health_registry.set_models_ready(true).await;
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to load models");
            health_registry
                .set_unhealthy(components::MODEL_STORE, format!("{:#}", e))
                .await;
        }
    }

    let sample_source = open_sample_source(&config, &registry, &health_registry).await;

    let activity = Arc::new(ActivityLog::new(config.activity_capacity));
    let mut orchestrator = PredictionOrchestrator::new(
        registry.clone(),
        Arc::new(Aggregator::with_capacity(config.history_capacity)),
        activity.clone(),
        config.orchestrator_config(),
    );
    if let Some(source) = sample_source {
        activity.push(
            ActivityLevel::Info,
            format!("Sample source ready: {}", source.describe()),
        );
        orchestrator = orchestrator.with_sample_source(source);
    }
    let orchestrator = Arc::new(orchestrator);

    let scheduler =
        Arc::new(AutoModeScheduler::new(orchestrator.clone()).with_health(health_registry.clone()));

    let app_state = Arc::new(
        api::AppState::new(health_registry.clone(), orchestrator, scheduler.clone())
            .with_defaults(config.default_model.clone(), config.auto_interval()),
    );

    if config.auto_start && registry.is_ready() {
        if let Err(e) = scheduler
            .start(config.auto_interval(), &config.default_model)
            .await
        {
            warn!(error = %e, "Auto mode could not be started");
        }
    }

    logger.log_startup(DETECTOR_VERSION, registry.is_ready());

    let mut api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal or a server failure
    let reason = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            "SIGINT received"
        }
        served = &mut api_handle => {
            match served {
                Ok(Ok(())) => "API server exited",
                Ok(Err(e)) => {
                    error!(error = %format!("{:#}", e), "API server failed");
                    "API server failed"
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    "API server task panicked"
                }
            }
        }
    };

    scheduler.stop().await;
    api_handle.abort();
    logger.log_shutdown(reason);
    info!("Shutting down");

    Ok(())
}

/// Dataset source when configured and readable, otherwise synthetic samples
/// over the loaded schema
async fn open_sample_source(
    config: &DetectorConfig,
    registry: &ModelRegistry,
    health: &HealthRegistry,
) -> Option<Arc<dyn SampleSource>> {
    if let Some(path) = &config.sample_path {
        match CsvSampleSource::from_path(path, config.sampling) {
            Ok(source) => return Some(Arc::new(source)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Sample dataset unavailable, using synthetic samples");
                health
                    .set_degraded(components::SAMPLE_SOURCE, e.to_string())
                    .await;
            }
        }
    }

    match registry.reference_schema() {
        Some(schema) => Some(Arc::new(RandomSampleSource::new(schema.clone()))),
        None => {
            health
                .set_degraded(components::SAMPLE_SOURCE, "No schema to sample from")
                .await;
            None
        }
    }
}
