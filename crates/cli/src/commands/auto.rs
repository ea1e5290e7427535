//! Auto mode CLI commands

use anyhow::Result;
use serde_json::json;

use crate::client::{ApiClient, AutoModeStatus, AutoStartRequest};
use crate::output::{
    color_status, format_interval, format_timestamp, print_info, print_json, print_success,
    OutputFormat,
};

pub async fn start(
    client: &ApiClient,
    interval_secs: Option<f64>,
    model: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let request = AutoStartRequest {
        interval_secs,
        model_id: model,
    };
    let status: AutoModeStatus = client.post("api/v1/auto/start", &request).await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Auto mode started with {} every {}",
                status.model_id.as_deref().unwrap_or("?"),
                status.interval_ms.map(format_interval).unwrap_or_default()
            ));
        }
    }

    Ok(())
}

pub async fn stop(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: AutoModeStatus = client.post("api/v1/auto/stop", &json!({})).await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => print_success(&format!(
            "Auto mode stopped after {} ticks ({} failed)",
            status.ticks, status.failures
        )),
    }

    Ok(())
}

pub async fn status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: AutoModeStatus = client.get("api/v1/auto").await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            println!("State:     {}", color_status(&status.state));
            if let Some(model) = &status.model_id {
                println!("Model:     {}", model);
            }
            if let Some(ms) = status.interval_ms {
                println!("Interval:  {}", format_interval(ms));
            }
            if let Some(started) = &status.started_at {
                println!("Started:   {}", format_timestamp(started));
            }
            println!("Ticks:     {}", status.ticks);
            println!("Failures:  {}", status.failures);
            if let Some(error) = &status.last_error {
                print_info(&format!("Last error: {}", error));
            }
        }
    }

    Ok(())
}
