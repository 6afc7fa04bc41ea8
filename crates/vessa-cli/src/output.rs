//! Table and JSON output formatting for CLI commands.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::{Table, Tabled};

use vessa_entity::rate_limit::RateLimitInfo;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of rows in the selected format
pub fn print_list<T: Serialize + Tabled>(rows: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// Print a single record as JSON, or as aligned key/value lines.
pub fn print_record<T: Serialize>(record: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
        OutputFormat::Table => {
            let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(record) else {
                return;
            };
            for (key, value) in fields {
                print_kv(&key, &display_value(&value));
            }
        }
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Format an optional timestamp for a table cell.
pub fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Shorten free text for a table cell.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}

/// One-line summary of the API quota.
pub fn rate_limit_line(info: &RateLimitInfo) -> String {
    let mut line = format!("{}/{} requests left", info.remaining(), info.limit());
    if let Some(reset_at) = info.reset_at() {
        line.push_str(&format!(", resets {}", timestamp(Some(reset_at))));
    }
    line
}

/// Print the quota reported by the last gateway response, if any.
pub fn print_rate_limit(info: Option<RateLimitInfo>, format: OutputFormat) {
    let Some(info) = info else {
        return;
    };
    if format != OutputFormat::Table {
        return;
    }
    if info.is_exhausted() {
        print_warning(&format!("API quota used up: {}", rate_limit_line(&info)));
    } else {
        print_kv("API quota", &rate_limit_line(&info));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer message", 8), "a longe…");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&serde_json::Value::Null), "-");
        assert_eq!(display_value(&serde_json::json!(["a", "b"])), "a, b");
        assert_eq!(display_value(&serde_json::json!(true)), "true");
    }

    #[test]
    fn test_rate_limit_line() {
        let info = RateLimitInfo::new(100, 42, None);
        assert_eq!(rate_limit_line(&info), "42/100 requests left");

        let reset = DateTime::<Utc>::from_timestamp(1_700_000_000, 0);
        let info = RateLimitInfo::new(100, 0, reset);
        assert!(rate_limit_line(&info).starts_with("0/100 requests left, resets "));
    }
}
