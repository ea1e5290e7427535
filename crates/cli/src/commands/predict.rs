//! Prediction and model CLI commands

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tabled::Tabled;

use crate::client::{ApiClient, ModelInfo, PredictRequest, PredictionRecord, SampleRequest};
use crate::output::{
    color_label, format_percent, format_timestamp, print_json, print_success, OutputFormat,
};

/// Row for the loaded models table
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    model: String,
}

/// Read a feature map from a JSON file, either bare or under `features`
pub fn load_features(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read features file {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse features file {}", path.display()))?;

    match value {
        Value::Object(mut map) => match map.remove("features") {
            Some(Value::Object(features)) => Ok(features),
            Some(_) => anyhow::bail!("'features' in {} must be an object", path.display()),
            None => Ok(map),
        },
        _ => anyhow::bail!("{} must contain a JSON object", path.display()),
    }
}

/// Classify a feature file, or a sample drawn by the detector when no file is given
pub async fn predict(
    client: &ApiClient,
    model: Option<String>,
    features: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let record: PredictionRecord = match features {
        Some(path) => {
            let request = PredictRequest {
                model_id: model,
                features: load_features(path)?,
            };
            client.post("api/v1/predict", &request).await?
        }
        None => {
            client
                .post("api/v1/predict/sample", &SampleRequest { model_id: model })
                .await?
        }
    };

    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Table => {
            print_success(&format!(
                "{} detected by {} (confidence {})",
                color_label(&record.label),
                record.model_used,
                format_percent(record.confidence)
            ));
            println!(
                "  Prediction #{} at {}",
                record.sequence,
                format_timestamp(&record.timestamp)
            );
            if !record.attack_types.is_empty() {
                println!("  Patterns: {}", record.attack_types.join(", "));
            }
        }
    }

    Ok(())
}

/// Show the loaded models and their feature schema
pub async fn models(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info: ModelInfo = client.get("api/v1/models").await?;

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => {
            let rows: Vec<ModelRow> = info
                .available_models
                .iter()
                .cloned()
                .chain(std::iter::once("ensemble".to_string()))
                .map(|model| ModelRow { model })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nFeatures ({}): {}", info.feature_count, info.features.join(", "));
        }
    }

    Ok(())
}
