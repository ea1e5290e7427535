//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any response as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a probability as percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Format a UTC timestamp to the second
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format milliseconds as seconds
pub fn format_interval(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

/// Color a verdict label
pub fn color_label(label: &str) -> String {
    match label {
        "Attack" => label.red().bold().to_string(),
        "Normal" => label.green().to_string(),
        _ => label.to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "running" | "success" => status.green().to_string(),
        "idle" | "info" => status.blue().to_string(),
        "warning" => status.yellow().to_string(),
        "error" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color an attack rate: high rates stand out
pub fn color_rate(rate: f64) -> String {
    let formatted = format_percent(rate);
    if rate >= 0.5 {
        formatted.red().to_string()
    } else if rate >= 0.2 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}
