//! API client for communicating with the detector API

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Error reported by the detector
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message} [{code}, HTTP {status}]")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("API error ({status}): {body}")]
    Unexpected { status: StatusCode, body: String },
}

/// API client for the detector
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        decode(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let error = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(ErrorResponse {
                error,
                code: Some(code),
            }) => ClientError::Api {
                status,
                code,
                message: error,
            },
            _ => ClientError::Unexpected { status, body },
        };
        return Err(error.into());
    }

    response.json().await.context("Failed to parse response")
}

// API request and response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub features: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoStartRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub sequence: u64,
    pub label: String,
    pub confidence: f64,
    pub model_used: String,
    #[serde(default)]
    pub attack_types: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_predictions: u64,
    pub attack_count: u64,
    pub normal_count: u64,
    pub attack_rate: f64,
    pub average_confidence: f64,
    pub history_len: usize,
    #[serde(default)]
    pub model_usage: BTreeMap<String, u64>,
    #[serde(default)]
    pub attack_types: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoModeStatus {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub ticks: u64,
    pub failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub available_models: Vec<String>,
    pub feature_count: usize,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_record_parses_server_payload() {
        let payload = r#"{
            "sequence": 7,
            "label": "Attack",
            "confidence": 0.91,
            "model_used": "ensemble",
            "timestamp": "2024-05-01T12:00:00Z"
        }"#;
        let record: PredictionRecord = serde_json::from_str(payload).unwrap();
        assert_eq!(record.sequence, 7);
        assert_eq!(record.label, "Attack");
        assert_eq!(record.model_used, "ensemble");
        assert!(record.attack_types.is_empty());
    }

    #[test]
    fn test_stats_parse_attack_types() {
        let payload = r#"{
            "total_predictions": 3,
            "attack_count": 2,
            "normal_count": 1,
            "attack_rate": 0.667,
            "average_confidence": 0.6,
            "history_len": 3,
            "model_usage": {"ensemble": 3},
            "attack_types": {"DoS": 1, "Port_Scan": 2}
        }"#;
        let stats: AggregateStats = serde_json::from_str(payload).unwrap();
        assert_eq!(stats.attack_types.get("Port_Scan"), Some(&2));
        assert_eq!(stats.model_usage.get("ensemble"), Some(&3));
    }

    #[test]
    fn test_idle_status_omits_run_fields() {
        let status: AutoModeStatus =
            serde_json::from_str(r#"{"state":"idle","ticks":0,"failures":0}"#).unwrap();
        assert_eq!(status.state, "idle");
        assert!(status.model_id.is_none());
        assert!(status.interval_ms.is_none());
    }

    #[test]
    fn test_client_rejects_bad_url() {
        assert!(ApiClient::new("not a url").is_err());
        assert!(ApiClient::new("http://localhost:8080").is_ok());
    }

    #[test]
    fn test_api_error_message() {
        let err = ClientError::Api {
            status: StatusCode::NOT_FOUND,
            code: "unknown_model".to_string(),
            message: "unknown model 'svm'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown model 'svm' [unknown_model, HTTP 404 Not Found]"
        );
    }
}
