//! Output formatters: consume events or rows, produce text.
//!
//! A formatter is anything that consumes the executor's output; these are
//! the built-in ones. Color is ANSI-based and disabled by `NO_COLOR` or a
//! non-terminal stdout.

use std::collections::BTreeSet;

use chrono::DateTime;

use ptx_engine::{Event, Execution, Row, Value};

use crate::error::{CliError, Result};

/// The `--output` switch.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[clap(rename_all = "lower")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
    Yaml,
    Pretty,
    Chart,
}

impl OutputFormat {
    /// Parse a config-file value (`defaults.output`).
    pub fn from_config(name: &str) -> Option<OutputFormat> {
        match name {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            "yaml" => Some(OutputFormat::Yaml),
            "pretty" => Some(OutputFormat::Pretty),
            "chart" => Some(OutputFormat::Chart),
            _ => None,
        }
    }
}

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Render an execution result in the requested format.
pub fn render(result: &Execution, format: OutputFormat, color: bool) -> Result<String> {
    match (format, result) {
        (OutputFormat::Table, Execution::Events(events)) => Ok(event_table(events, color)),
        (OutputFormat::Table, Execution::Rows(rows)) => Ok(row_table(rows, color)),
        (OutputFormat::Json, _) => to_json(result),
        (OutputFormat::Yaml, _) => to_yaml(result),
        (OutputFormat::Csv, Execution::Events(events)) => Ok(event_csv(events)),
        (OutputFormat::Csv, Execution::Rows(rows)) => Ok(row_csv(rows)),
        (OutputFormat::Pretty, Execution::Events(events)) => Ok(pretty_events(events, color)),
        (OutputFormat::Pretty, Execution::Rows(rows)) => Ok(row_table(rows, color)),
        (OutputFormat::Chart, _) => Ok(chart(result, color)),
    }
}

fn stamp(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

fn event_columns(events: &[Event]) -> Vec<String> {
    let mut fields = BTreeSet::new();
    for event in events {
        fields.extend(event.fields.keys().cloned());
    }
    // The meta columns lead; a field with the same name fills the one column.
    let mut columns = vec!["timestamp".to_string(), "source".to_string()];
    columns.extend(fields.into_iter().filter(|f| f != "timestamp" && f != "source"));
    columns
}

fn event_cell(event: &Event, column: &str) -> String {
    match column {
        "timestamp" => stamp(event.timestamp),
        "source" => event.source.clone(),
        field => event.render_field(field),
    }
}

fn table(header: &[String], body: Vec<Vec<String>>, color: bool) -> String {
    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in &body {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    let head: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect();
    if color {
        out.push_str(&format!("{BOLD}{}{RESET}\n", head.join("  ")));
    } else {
        out.push_str(&head.join("  "));
        out.push('\n');
    }

    for row in body {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn event_table(events: &[Event], color: bool) -> String {
    if events.is_empty() {
        return "no events\n".to_string();
    }
    let columns = event_columns(events);
    let body = events
        .iter()
        .map(|e| columns.iter().map(|c| event_cell(e, c)).collect())
        .collect();
    table(&columns, body, color)
}

fn row_columns(rows: &[Row]) -> Vec<String> {
    let mut keys = BTreeSet::new();
    for row in rows {
        keys.extend(row.keys().cloned());
    }
    keys.into_iter().collect()
}

fn row_table(rows: &[Row], color: bool) -> String {
    if rows.is_empty() {
        return "no rows\n".to_string();
    }
    let columns = row_columns(rows);
    let body = rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.get(c).map(Value::render).unwrap_or_default())
                .collect()
        })
        .collect();
    table(&columns, body, color)
}

// ---------------------------------------------------------------------------
// Structured formats
// ---------------------------------------------------------------------------

fn to_json(result: &Execution) -> Result<String> {
    let text = match result {
        Execution::Events(events) => serde_json::to_string_pretty(events),
        Execution::Rows(rows) => serde_json::to_string_pretty(rows),
    }
    .map_err(|e| CliError::Internal(format!("JSON serialization failed: {e}")))?;
    Ok(text + "\n")
}

fn to_yaml(result: &Execution) -> Result<String> {
    match result {
        Execution::Events(events) => serde_yaml::to_string(events),
        Execution::Rows(rows) => serde_yaml::to_string(rows),
    }
    .map_err(|e| CliError::Internal(format!("YAML serialization failed: {e}")))
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn csv(header: &[String], body: Vec<Vec<String>>) -> String {
    let mut out = String::new();
    out.push_str(
        &header
            .iter()
            .map(|h| csv_escape(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in body {
        out.push_str(
            &row.iter()
                .map(|c| csv_escape(c))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}

fn event_csv(events: &[Event]) -> String {
    let columns = event_columns(events);
    let body = events
        .iter()
        .map(|e| columns.iter().map(|c| event_cell(e, c)).collect())
        .collect();
    csv(&columns, body)
}

fn row_csv(rows: &[Row]) -> String {
    let columns = row_columns(rows);
    let body = rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.get(c).map(Value::render).unwrap_or_default())
                .collect()
        })
        .collect();
    csv(&columns, body)
}

// ---------------------------------------------------------------------------
// Pretty / chart
// ---------------------------------------------------------------------------

fn pretty_events(events: &[Event], color: bool) -> String {
    let mut out = String::new();
    for event in events {
        if color {
            out.push_str(&format!(
                "{CYAN}{}{RESET} {DIM}{}{RESET}\n",
                stamp(event.timestamp),
                event.source
            ));
        } else {
            out.push_str(&format!("{} {}\n", stamp(event.timestamp), event.source));
        }
        for (name, value) in &event.fields {
            out.push_str(&format!("  {name}: {}\n", value.render()));
        }
        if let Some(raw) = &event.raw {
            if color {
                out.push_str(&format!("  {DIM}{raw}{RESET}\n"));
            } else {
                out.push_str(&format!("  {raw}\n"));
            }
        }
        out.push('\n');
    }
    out
}

const CHART_WIDTH: usize = 40;

/// Horizontal bar chart. Rows chart their first numeric column against the
/// remaining columns as the label; events chart per-source line counts.
fn chart(result: &Execution, color: bool) -> String {
    let pairs: Vec<(String, f64)> = match result {
        Execution::Rows(rows) => {
            let columns = row_columns(rows);
            let Some(value_col) = columns.iter().find(|c| {
                rows.iter()
                    .all(|r| r.get(*c).and_then(Value::as_number).is_some())
            }) else {
                return "no numeric column to chart\n".to_string();
            };
            rows.iter()
                .map(|r| {
                    let label: Vec<String> = columns
                        .iter()
                        .filter(|c| *c != value_col)
                        .map(|c| r.get(c).map(Value::render).unwrap_or_default())
                        .collect();
                    let label = if label.is_empty() {
                        value_col.clone()
                    } else {
                        label.join(":")
                    };
                    let value = r.get(value_col).and_then(Value::as_number).unwrap_or(0.0);
                    (label, value)
                })
                .collect()
        }
        Execution::Events(events) => {
            let mut counts: Vec<(String, f64)> = Vec::new();
            for event in events {
                match counts.iter_mut().find(|(s, _)| *s == event.source) {
                    Some((_, n)) => *n += 1.0,
                    None => counts.push((event.source.clone(), 1.0)),
                }
            }
            counts
        }
    };

    if pairs.is_empty() {
        return "nothing to chart\n".to_string();
    }

    let max = pairs.iter().map(|(_, v)| *v).fold(f64::MIN, f64::max);
    let label_width = pairs.iter().map(|(l, _)| l.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (label, value) in &pairs {
        let filled = if max > 0.0 {
            ((value / max) * CHART_WIDTH as f64).round() as usize
        } else {
            0
        };
        let bar = "█".repeat(filled.max(usize::from(*value > 0.0)));
        if color {
            out.push_str(&format!(
                "{label:<label_width$}  {CYAN}{bar}{RESET} {value}\n"
            ));
        } else {
            out.push_str(&format!("{label:<label_width$}  {bar} {value}\n"));
        }
    }
    out
}
