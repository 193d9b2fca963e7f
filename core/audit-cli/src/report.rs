//! Text and JSON rendering of session records.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rdp_audit_core::SessionRecord;
use serde::Serialize;
use std::fmt::Write;

const OPEN_LABEL: &str = "open";

/// JSON shape of one record, with the derived fields the table shows.
#[derive(Debug, Serialize)]
pub struct SessionRow<'a> {
    #[serde(flatten)]
    pub record: &'a SessionRecord,
    pub open: bool,
    pub duration_secs: i64,
}

impl<'a> SessionRow<'a> {
    pub fn new(record: &'a SessionRecord, now: DateTime<Utc>) -> Self {
        Self {
            record,
            open: record.is_open(),
            duration_secs: record.duration(now).num_seconds(),
        }
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn end_label(record: &SessionRecord) -> String {
    record
        .end_time
        .map(timestamp)
        .unwrap_or_else(|| OPEN_LABEL.to_string())
}

/// `1h 02m 03s`, `4m 05s` or `9s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn render_table(records: &[SessionRecord], now: DateTime<Utc>) -> String {
    if records.is_empty() {
        return "No sessions recorded.\n".to_string();
    }

    let header = ["ID", "HOST", "CLIENT", "START", "END", "DURATION"];
    let rows: Vec<[String; 6]> = records
        .iter()
        .map(|record| {
            [
                record.id.to_string(),
                record.host_ip.clone(),
                record.client_ip.clone(),
                timestamp(record.start_time),
                end_label(record),
                format_duration(record.duration(now)),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    };
    push_line(&header);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        push_line(&cells);
    }
    out
}

pub fn render_detail(record: &SessionRecord, now: DateTime<Utc>) -> String {
    format!(
        "Session {}\n  host:     {}\n  client:   {}\n  start:    {}\n  end:      {}\n  duration: {}\n",
        record.id,
        record.host_ip,
        record.client_ip,
        timestamp(record.start_time),
        end_label(record),
        format_duration(record.duration(now)),
    )
}
