//! Output formatting utilities

use carbon_lib::Metrics;
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

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a mass in kilograms, switching to tonnes above 1000 kg
pub fn format_kg(kg: f64) -> String {
    if kg.abs() >= 1000.0 {
        format!("{:.2} t", kg / 1000.0)
    } else {
        format!("{:.2} kg", kg)
    }
}

/// Color R² by fit quality
pub fn color_r2(r2: f64) -> String {
    let formatted = format!("{:.3}", r2);
    if r2 >= 0.8 {
        formatted.green().to_string()
    } else if r2 >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Print held-out metrics as an aligned block
pub fn print_metrics(metrics: &Metrics) {
    println!("{}", "Held-out Metrics".bold());
    println!("{}", "-".repeat(40));
    println!("MAE:                    {}", format_kg(metrics.mae));
    println!("RMSE:                   {}", format_kg(metrics.rmse));
    println!("R²:                     {}", color_r2(metrics.r2));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_kg() {
        assert_eq!(format_kg(12.3456), "12.35 kg");
        assert_eq!(format_kg(2500.0), "2.50 t");
    }

    #[test]
    fn test_color_r2_keeps_value() {
        colored::control::set_override(false);
        assert_eq!(color_r2(0.91234), "0.912");
    }
}
