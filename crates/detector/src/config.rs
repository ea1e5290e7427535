//! Detector configuration

use anyhow::{Context, Result};
use detector_lib::predictor::{OrchestratorConfig, DEFAULT_SAMPLE_TIMEOUT};
use detector_lib::sample::SamplingMode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Config file name looked up in the working directory, extension optional
pub const CONFIG_FILE: &str = "detector";

/// Environment variable prefix, e.g. `DETECTOR_API_PORT`
pub const ENV_PREFIX: &str = "DETECTOR";

/// Detector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Instance name attached to structured log events
    #[serde(default = "default_instance")]
    pub instance: String,

    /// HTTP port for the prediction API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding `feature_names.json` and the model files
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// CSV dataset for sample predictions; synthetic samples when unset
    #[serde(default)]
    pub sample_path: Option<PathBuf>,

    #[serde(default)]
    pub sampling: SamplingMode,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_activity_capacity")]
    pub activity_capacity: usize,

    /// Auto mode interval used when a start request names none
    #[serde(default = "default_auto_interval")]
    pub auto_interval_secs: f64,

    /// Per-model scoring timeout in milliseconds
    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_ms: u64,

    /// Model used when a request names none
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Start auto mode once models are loaded
    #[serde(default)]
    pub auto_start: bool,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "ids-detector".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_history_capacity() -> usize {
    detector_lib::analytics::HISTORY_CAPACITY
}

fn default_activity_capacity() -> usize {
    detector_lib::analytics::ACTIVITY_CAPACITY
}

fn default_auto_interval() -> f64 {
    2.0
}

fn default_inference_timeout() -> u64 {
    250
}

fn default_model() -> String {
    "random_forest".to_string()
}

impl DetectorConfig {
    /// Load configuration from `detector.{toml,yaml,json}` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from the named file (optional) and the environment
    pub fn load_from(file: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read detector configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid detector configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.auto_interval_secs.is_finite() && self.auto_interval_secs > 0.0) {
            anyhow::bail!(
                "auto_interval_secs must be a positive number, got {}",
                self.auto_interval_secs
            );
        }
        if self.inference_timeout_ms == 0 {
            anyhow::bail!("inference_timeout_ms must be greater than zero");
        }
        if self.history_capacity == 0 || self.activity_capacity == 0 {
            anyhow::bail!("history_capacity and activity_capacity must be greater than zero");
        }
        Ok(())
    }

    pub fn auto_interval(&self) -> Duration {
        Duration::from_secs_f64(self.auto_interval_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            inference_timeout: Duration::from_millis(self.inference_timeout_ms),
            sample_timeout: DEFAULT_SAMPLE_TIMEOUT,
            ..OrchestratorConfig::default()
        }
    }
}
