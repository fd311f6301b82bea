//! Result → human/json string formatting.
//!
//! - **Human** (default): one item per line, aligned columns for records
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use std::collections::HashSet;

use serde_json::{json, Value};

use replica_admin_core::{FileEntry, Timestamp};
use replica_admin_durability::FormatVersion;
use replica_admin_storage::ConsistencyReport;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn human_time(ts: Timestamp) -> String {
    format!("{} ({})", ts.as_millis(), ts)
}

/// Format a set of filenames, sorted.
pub fn format_filenames(names: &HashSet<String>, mode: OutputMode) -> String {
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();
    match mode {
        OutputMode::Json => pretty(&json!(sorted)),
        OutputMode::Human if sorted.is_empty() => "(empty set)".to_string(),
        OutputMode::Human => sorted
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Format one entry with its replica records.
pub fn format_entry(entry: &FileEntry, mode: OutputMode) -> String {
    let general = entry.general_state();
    match mode {
        OutputMode::Json => {
            let replicas: Vec<Value> = entry
                .replica_records()
                .map(|r| {
                    json!({
                        "replica": r.replica_id().as_str(),
                        "state": r.upload_state(),
                        "last_state_change": r.last_state_change().as_millis(),
                    })
                })
                .collect();
            pretty(&json!({
                "filename": entry.filename(),
                "checksum": entry.checksum(),
                "state": general.state,
                "last_state_change": general.at.as_millis(),
                "replicas": replicas,
            }))
        }
        OutputMode::Human => {
            let mut lines = vec![
                format!("filename: {}", entry.filename()),
                format!("checksum: {}", entry.checksum()),
                format!("state:    {} at {}", general.state, human_time(general.at)),
            ];
            let width = entry
                .replica_records()
                .map(|r| r.replica_id().as_str().len())
                .max()
                .unwrap_or(0);
            for r in entry.replica_records() {
                lines.push(format!(
                    "  {:<width$}  {:<16}  {}",
                    r.replica_id().as_str(),
                    r.upload_state().as_str(),
                    human_time(r.last_state_change()),
                    width = width
                ));
            }
            lines.join("\n")
        }
    }
}

/// Format a consistency report.
pub fn format_report(report: &ConsistencyReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            pretty(&serde_json::to_value(report).unwrap_or_else(|e| json!({ "error": e.to_string() })))
        }
        OutputMode::Human => {
            let mut lines = vec![format!("files: {}", report.total_files)];
            for summary in &report.replicas {
                let counts: Vec<String> = summary
                    .states
                    .iter()
                    .map(|(state, n)| format!("{}={}", state, n))
                    .collect();
                lines.push(format!("{}: {}", summary.replica, counts.join(" ")));
            }
            lines.push(format!("incomplete: {}", report.incomplete_files.len()));
            for name in &report.incomplete_files {
                lines.push(format!("  {}", name));
            }
            lines.join("\n")
        }
    }
}

/// Format the outcome of an upgrade.
pub fn format_upgrade(
    path: &str,
    from: Option<FormatVersion>,
    entries: usize,
    mode: OutputMode,
) -> String {
    let from = from.map(|v| v.token()).unwrap_or("none");
    match mode {
        OutputMode::Json => pretty(&json!({
            "path": path,
            "from_version": from,
            "to_version": FormatVersion::Current.token(),
            "entries": entries,
        })),
        OutputMode::Human => format!(
            "{}: {} -> {} ({} entries)",
            path,
            from,
            FormatVersion::Current,
            entries
        ),
    }
}

/// Format an error.
pub fn format_error(err: &anyhow::Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&json!({ "error": format!("{:#}", err) })),
        OutputMode::Human => format!("(error) {:#}", err),
    }
}
