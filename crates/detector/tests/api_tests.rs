//! Integration tests for the detector API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use detector_lib::{
    analytics::{ActivityLog, Aggregator},
    health::{components, HealthRegistry},
    models::{FeatureSchema, ModelId},
    predictor::{
        AutoModeScheduler, LinearScorer, Link, ModelHandle, ModelRegistry, OrchestratorConfig,
        PredictionOrchestrator,
    },
    sample::RandomSampleSource,
};
use ids_detector::api::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn sum_model(id: ModelId) -> ModelHandle {
    ModelHandle::new(
        id,
        FeatureSchema::new(["a", "b"]),
        LinearScorer::new(vec![1.0, 1.0], 0.0, Link::Identity),
    )
}

async fn setup_test_app(load_models: bool) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::with_detector_components().await;

    let registry = Arc::new(ModelRegistry::new());
    if load_models {
        registry
            .install(vec![sum_model(ModelId::RandomForest), sum_model(ModelId::XgBoost)])
            .unwrap();
        health_registry.set_models_ready(true).await;
    }

    let orchestrator = Arc::new(
        PredictionOrchestrator::new(
            registry,
            Arc::new(Aggregator::new()),
            Arc::new(ActivityLog::default()),
            OrchestratorConfig::default(),
        )
        .with_sample_source(Arc::new(RandomSampleSource::new(FeatureSchema::new([
            "a", "b",
        ])))),
    );
    let scheduler = Arc::new(
        AutoModeScheduler::new(orchestrator.clone()).with_health(health_registry.clone()),
    );
    let state = Arc::new(AppState::new(health_registry, orchestrator, scheduler));
    let router = create_router(state.clone());

    (router, state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_predict_returns_verdict() {
    let (app, _state) = setup_test_app(true).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(json!({"model_id": "random_forest", "features": {"a": 0.3, "b": 0.4}})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "Attack");
    assert!((body["confidence"].as_f64().unwrap() - 0.7).abs() < 1e-9);
    assert_eq!(body["model_used"], "random_forest");
    assert_eq!(body["sequence"], 1);
}

#[tokio::test]
async fn test_predict_uses_default_model() {
    let (app, _state) = setup_test_app(true).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(json!({"features": {"a": 0.1, "b": 0.1}})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "Normal");
    assert_eq!(body["model_used"], "random_forest");
}

#[tokio::test]
async fn test_predict_error_mapping() {
    let (app, _state) = setup_test_app(true).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(json!({"model_id": "ensemble", "features": {"a": 0.3}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "missing_feature");
    assert!(body["error"].as_str().unwrap().contains('b'));

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(json!({"model_id": "random_forest", "features": {"a": 0.3, "b": "x"}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_feature_type");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(json!({"model_id": "random_forest", "features": {"a": [1], "b": 0.4}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_feature_type");
    assert!(body["error"].as_str().unwrap().ends_with(": a"));

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(json!({"model_id": "svm", "features": {"a": 0.3, "b": 0.1}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "unknown_model");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(json!({"model_id": "random_forest", "features": {"a": 0.9, "b": 0.9}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "scoring_failed");

    let (_, stats) = send(&app, "GET", "/api/v1/stats", None).await;
    assert_eq!(stats["total_predictions"], 0);
}

#[tokio::test]
async fn test_predict_before_models_loaded() {
    let (app, _state) = setup_test_app(false).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(json!({"model_id": "ensemble", "features": {"a": 0.3, "b": 0.4}})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "models_not_loaded");

    let (status, _) = send(&app, "GET", "/api/v1/models", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_auto_start_before_models_load() {
    let (app, state) = setup_test_app(false).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auto/start",
        Some(json!({"interval_secs": 60.0, "model_id": "random_forest"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "running");

    let (status, _) = send(&app, "POST", "/api/v1/auto/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!state.scheduler.is_running().await);
    assert_eq!(state.orchestrator.aggregator().stats().total_predictions, 0);
}

#[tokio::test]
async fn test_stats_history_and_clear() {
    let (app, _state) = setup_test_app(true).await;

    for (a, b) in [(0.3, 0.4), (0.1, 0.1), (0.5, 0.4)] {
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/predict",
            Some(json!({"model_id": "ensemble", "features": {"a": a, "b": b}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, stats) = send(&app, "GET", "/api/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_predictions"], 3);
    assert_eq!(stats["attack_count"], 2);
    assert_eq!(stats["normal_count"], 1);
    assert_eq!(stats["model_usage"]["ensemble"], 3);
    // Features a and b match no named pattern
    assert_eq!(stats["attack_types"], json!({"Other": 2}));

    let (_, history) = send(&app, "GET", "/api/v1/history?n=2", None).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["sequence"], 3);
    assert_eq!(history[1]["sequence"], 2);
    assert_eq!(history[0]["attack_types"], json!([]));

    let (_, activity) = send(&app, "GET", "/api/v1/activity?n=1", None).await;
    assert!(activity[0]["message"]
        .as_str()
        .unwrap()
        .starts_with("ATTACK DETECTED by ensemble"));

    let (status, body) = send(&app, "POST", "/api/v1/clear", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], true);

    let (_, stats) = send(&app, "GET", "/api/v1/stats", None).await;
    assert_eq!(stats["total_predictions"], 0);
    assert_eq!(stats["attack_types"], json!({}));
    let (_, history) = send(&app, "GET", "/api/v1/history", None).await;
    assert!(history.as_array().unwrap().is_empty());
    let (_, activity) = send(&app, "GET", "/api/v1/activity", None).await;
    assert!(activity.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_predict_sample_and_batch() {
    let (app, _state) = setup_test_app(true).await;

    // Synthetic values may push the sum outside [0, 1]; either way the
    // response is a verdict or a scoring failure, never a crash
    let (status, _) = send(&app, "POST", "/api/v1/predict/sample", None).await;
    assert!(status == StatusCode::OK || status == StatusCode::BAD_GATEWAY);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict/batch",
        Some(json!({
            "model_id": "xgboost",
            "rows": [{"a": 0.3, "b": 0.4}, {"a": 0.3}, {"a": 0.0, "b": 0.2}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["outcomes"][1]["row_index"], 1);
    assert_eq!(body["outcomes"][1]["code"], "missing_feature");
    assert_eq!(body["outcomes"][2]["result"]["label"], "Normal");
}

#[tokio::test]
async fn test_auto_mode_lifecycle() {
    let (app, state) = setup_test_app(true).await;

    let (status, body) = send(&app, "GET", "/api/v1/auto", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auto/start",
        Some(json!({"interval_secs": 60.0, "model_id": "ensemble"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "running");
    assert_eq!(body["interval_ms"], 60000);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auto/start",
        Some(json!({"interval_secs": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_running");

    let (status, body) = send(&app, "POST", "/api/v1/auto/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");

    let (status, _) = send(&app, "POST", "/api/v1/auto/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!state.scheduler.is_running().await);
}

#[tokio::test]
async fn test_auto_start_rejections() {
    let (app, _state) = setup_test_app(true).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auto/start",
        Some(json!({"interval_secs": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_interval");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auto/start",
        Some(json!({"interval_secs": -1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_interval");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auto/start",
        Some(json!({"model_id": "lightgbm"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "unknown_model");
}

#[tokio::test]
async fn test_models_endpoint() {
    let (app, _state) = setup_test_app(true).await;

    let (status, body) = send(&app, "GET", "/api/v1/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available_models"], json!(["random_forest", "xgboost"]));
    assert_eq!(body["feature_count"], 2);
    assert_eq!(body["features"], json!(["a", "b"]));
}

#[tokio::test]
async fn test_healthz_degraded_still_ok() {
    let (app, state) = setup_test_app(true).await;

    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    state
        .health_registry
        .set_degraded(components::SAMPLE_SOURCE, "Dataset unreadable")
        .await;
    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");

    state
        .health_registry
        .set_unhealthy(components::MODEL_STORE, "No models found in models")
        .await;
    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_model_loading() {
    let (app, _state) = setup_test_app(false).await;
    let (status, body) = send(&app, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
    assert_eq!(body["reason"], "Models not loaded");

    let (app, _state) = setup_test_app(true).await;
    let (status, body) = send(&app, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state) = setup_test_app(true).await;
    send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(json!({"model_id": "random_forest", "features": {"a": 0.3, "b": 0.4}})),
    )
    .await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("intrusion_detector_predictions_total"));
}
