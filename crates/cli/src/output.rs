//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table of rows, or `json` when JSON output was requested
pub fn print_table<T: Tabled, J: Serialize + ?Sized>(
    rows: Vec<T>,
    json: &J,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                print_warning("No claims found");
                return Ok(());
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(json)?,
    }
    Ok(())
}

pub fn print_json<J: Serialize + ?Sized>(value: &J) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2}Ti", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Usage as a percentage of capacity
pub fn format_usage(used: u64, capacity: u64) -> String {
    if capacity == 0 {
        return "-".to_string();
    }
    format!("{:.0}%", used as f64 * 100.0 / capacity as f64)
}

/// Color an outcome or skip reason code
pub fn color_outcome(code: &str) -> String {
    match code {
        "resize" | "resized" | "dry_run" => code.green().to_string(),
        "pending" | "at_ceiling" => code.yellow().to_string(),
        "below_threshold" => code.normal().to_string(),
        "ineligible" | "failed" => code.red().to_string(),
        _ => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(1536), "1.50Ki");
        assert_eq!(format_bytes(12 * 1024 * 1024 * 1024), "12.00Gi");
    }

    #[test]
    fn test_format_usage() {
        assert_eq!(format_usage(9, 10), "90%");
        assert_eq!(format_usage(1, 0), "-");
    }
}
