//! Live analytics CLI commands

use anyhow::Result;
use serde_json::json;
use tabled::Tabled;

use crate::client::{ActivityEntry, AggregateStats, ApiClient, ClearResponse, PredictionRecord};
use crate::output::{
    color_label, color_rate, color_status, format_percent, format_timestamp, print_json,
    print_success, print_warning, OutputFormat,
};

/// Row for the history table
#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "#")]
    sequence: u64,
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Patterns")]
    patterns: String,
}

/// Row for the activity table
#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Row for the model usage table
#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Predictions")]
    count: u64,
}

/// Row for the attack pattern table
#[derive(Tabled)]
struct PatternRow {
    #[tabled(rename = "Pattern")]
    pattern: String,
    #[tabled(rename = "Attacks")]
    count: u64,
}

pub async fn show_stats(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let stats: AggregateStats = client.get("api/v1/stats").await?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Table => {
            println!("Total predictions:   {}", stats.total_predictions);
            println!("Attacks:             {}", stats.attack_count);
            println!("Normal:              {}", stats.normal_count);
            println!("Attack rate:         {}", color_rate(stats.attack_rate));
            println!(
                "Average confidence:  {} (last {})",
                format_percent(stats.average_confidence),
                stats.history_len
            );

            if !stats.model_usage.is_empty() {
                let rows: Vec<UsageRow> = stats
                    .model_usage
                    .into_iter()
                    .map(|(model, count)| UsageRow { model, count })
                    .collect();
                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("\n{}", table);
            }

            if !stats.attack_types.is_empty() {
                let mut rows: Vec<PatternRow> = stats
                    .attack_types
                    .into_iter()
                    .map(|(pattern, count)| PatternRow { pattern, count })
                    .collect();
                rows.sort_by(|a, b| b.count.cmp(&a.count));
                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("\n{}", table);
            }
        }
    }

    Ok(())
}

pub async fn show_history(client: &ApiClient, n: usize, format: OutputFormat) -> Result<()> {
    let history: Vec<PredictionRecord> = client.get(&format!("api/v1/history?n={}", n)).await?;

    match format {
        OutputFormat::Json => print_json(&history)?,
        OutputFormat::Table => {
            if history.is_empty() {
                print_warning("No predictions recorded");
                return Ok(());
            }

            let rows: Vec<HistoryRow> = history
                .iter()
                .map(|r| HistoryRow {
                    sequence: r.sequence,
                    timestamp: format_timestamp(&r.timestamp),
                    label: color_label(&r.label),
                    confidence: format_percent(r.confidence),
                    model: r.model_used.clone(),
                    patterns: r.attack_types.join(", "),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nShowing {} most recent predictions", history.len());
        }
    }

    Ok(())
}

pub async fn show_activity(client: &ApiClient, n: usize, format: OutputFormat) -> Result<()> {
    let entries: Vec<ActivityEntry> = client.get(&format!("api/v1/activity?n={}", n)).await?;

    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Table => {
            if entries.is_empty() {
                print_warning("No activity yet");
                return Ok(());
            }

            let rows: Vec<ActivityRow> = entries
                .iter()
                .map(|e| ActivityRow {
                    timestamp: format_timestamp(&e.timestamp),
                    level: color_status(&e.level),
                    message: e.message.clone(),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

/// Reset statistics, history and the activity log
pub async fn clear(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: ClearResponse = client.post("api/v1/clear", &json!({})).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => print_success("Statistics, history and activity cleared"),
    }

    Ok(())
}
