//! Output formatting utilities

use capdash_lib::{CapacityStatus, ProfileCapacity};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a section heading
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(60));
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

/// Compact capacity such as `D:2 DHA:1`; zero slots are omitted
pub fn format_capacity(capacity: &ProfileCapacity) -> String {
    let parts: Vec<String> = capacity
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(profile, count)| format!("{}:{}", profile, count))
        .collect();
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(" ")
    }
}

/// Color status based on value
pub fn color_status(status: CapacityStatus) -> String {
    match status {
        CapacityStatus::Exceeded => status.as_str().red().bold().to_string(),
        CapacityStatus::AtCapacity => status.as_str().yellow().to_string(),
        CapacityStatus::WithinLimit => status.as_str().green().to_string(),
    }
}

/// Color a cluster's API status
pub fn color_cluster_status(status: &str, degraded: bool) -> String {
    if degraded {
        return format!("{} (degraded)", status).yellow().to_string();
    }
    match status.to_lowercase().as_str() {
        "ready" | "running" => status.green().to_string(),
        "not_ready" | "provisioning" => status.yellow().to_string(),
        "error" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}
