//! HTTP API for predictions, analytics, auto mode, health checks and metrics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use detector_lib::{
    analytics::ActivityEntry,
    health::{ComponentStatus, HealthRegistry},
    observability::DetectorMetrics,
    predictor::{
        AutoModeScheduler, AutoModeStatus, BatchOutcome, ModelInfo, PredictionOrchestrator,
    },
    AggregateStats, PredictionError, PredictionRecord, RawFeatureMap, SchedulerError,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Records returned by `GET /history` when `n` is omitted
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Entries returned by `GET /activity` when `n` is omitted
pub const DEFAULT_ACTIVITY_LIMIT: usize = 20;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: DetectorMetrics,
    pub orchestrator: Arc<PredictionOrchestrator>,
    pub scheduler: Arc<AutoModeScheduler>,
    /// Model used when a request names none
    pub default_model: String,
    /// Auto mode interval used when a start request names none
    pub default_interval: Duration,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        orchestrator: Arc<PredictionOrchestrator>,
        scheduler: Arc<AutoModeScheduler>,
    ) -> Self {
        Self {
            health_registry,
            metrics: DetectorMetrics::new(),
            orchestrator,
            scheduler,
            default_model: "random_forest".to_string(),
            default_interval: detector_lib::predictor::DEFAULT_AUTO_INTERVAL,
        }
    }

    pub fn with_defaults(mut self, model: impl Into<String>, interval: Duration) -> Self {
        self.default_model = model.into();
        self.default_interval = interval;
        self
    }

    fn model_or_default(&self, requested: Option<String>) -> String {
        requested.unwrap_or_else(|| self.default_model.clone())
    }
}

/// Error returned by every API endpoint as `{error, code}`
#[derive(Debug)]
pub enum ApiError {
    Prediction(PredictionError),
    Scheduler(SchedulerError),
}

impl From<PredictionError> for ApiError {
    fn from(e: PredictionError) -> Self {
        ApiError::Prediction(e)
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        ApiError::Scheduler(e)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

fn prediction_status(e: &PredictionError) -> StatusCode {
    match e {
        PredictionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PredictionError::UnknownModel { .. } => StatusCode::NOT_FOUND,
        PredictionError::ModelsNotLoaded | PredictionError::EmptyEnsemble => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PredictionError::Scoring { .. } | PredictionError::Sample(_) => StatusCode::BAD_GATEWAY,
        PredictionError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        PredictionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Prediction(e) => prediction_status(e),
            ApiError::Scheduler(SchedulerError::AlreadyRunning { .. }) => StatusCode::CONFLICT,
            ApiError::Scheduler(SchedulerError::InvalidInterval) => StatusCode::BAD_REQUEST,
            ApiError::Scheduler(SchedulerError::Rejected(e)) => prediction_status(e),
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, code) = match self {
            ApiError::Prediction(e) => (e.to_string(), e.kind()),
            ApiError::Scheduler(e) => (e.to_string(), e.kind()),
        };
        ErrorBody {
            error,
            code: code.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub model_id: Option<String>,
    pub features: RawFeatureMap,
}

#[derive(Debug, Default, Deserialize)]
pub struct SampleRequest {
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub model_id: Option<String>,
    pub rows: Vec<RawFeatureMap>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub model_id: String,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<BatchOutcome>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoStartRequest {
    #[serde(default)]
    pub interval_secs: Option<f64>,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub n: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> ApiResult<PredictionRecord> {
    let model_id = state.model_or_default(request.model_id);
    let record = state
        .orchestrator
        .predict_once(&model_id, request.features)
        .await?;
    Ok(Json(record))
}

async fn predict_sample(
    State(state): State<Arc<AppState>>,
    request: Option<Json<SampleRequest>>,
) -> ApiResult<PredictionRecord> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let model_id = state.model_or_default(request.model_id);
    let record = state.orchestrator.predict_sample(&model_id).await?;
    Ok(Json(record))
}

async fn predict_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<BatchResponse> {
    let model_id = state.model_or_default(request.model_id);
    let outcomes = state
        .orchestrator
        .predict_batch(&model_id, request.rows)
        .await?;
    let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();

    Ok(Json(BatchResponse {
        failed: outcomes.len() - succeeded,
        succeeded,
        model_id,
        outcomes,
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<AggregateStats> {
    Json(state.orchestrator.aggregator().stats())
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<PredictionRecord>> {
    let n = query.n.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.orchestrator.aggregator().recent(n))
}

async fn clear(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    state.orchestrator.aggregator().clear();
    state.orchestrator.activity().clear();
    state.metrics.set_history_size(0);
    info!("Prediction history and activity log cleared");
    Json(ClearResponse { cleared: true })
}

async fn auto_status(State(state): State<Arc<AppState>>) -> Json<AutoModeStatus> {
    Json(state.scheduler.status().await)
}

async fn auto_start(
    State(state): State<Arc<AppState>>,
    request: Option<Json<AutoStartRequest>>,
) -> ApiResult<AutoModeStatus> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let interval = match request.interval_secs {
        None => state.default_interval,
        Some(secs) => {
            Duration::try_from_secs_f64(secs).map_err(|_| SchedulerError::InvalidInterval)?
        }
    };
    let model_id = state.model_or_default(request.model_id);
    let status = state.scheduler.start(interval, &model_id).await?;
    Ok(Json(status))
}

async fn auto_stop(State(state): State<Arc<AppState>>) -> Json<AutoModeStatus> {
    Json(state.scheduler.stop().await)
}

async fn models(State(state): State<Arc<AppState>>) -> ApiResult<ModelInfo> {
    state
        .orchestrator
        .registry()
        .info()
        .map(Json)
        .ok_or(ApiError::Prediction(PredictionError::ModelsNotLoaded))
}

async fn activity(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<ActivityEntry>> {
    let n = query.n.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    Json(state.orchestrator.activity().recent(n))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once models are loaded
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/predict", post(predict))
        .route("/predict/sample", post(predict_sample))
        .route("/predict/batch", post(predict_batch))
        .route("/stats", get(stats))
        .route("/history", get(history))
        .route("/clear", post(clear))
        .route("/auto", get(auto_status))
        .route("/auto/start", post(auto_start))
        .route("/auto/stop", post(auto_stop))
        .route("/models", get(models))
        .route("/activity", get(activity))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
