// Tracklog CLI - Output tables
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Output writers.
//!
//! One directory per input file, holding a CSV per derived table and the
//! full report as `report.json`.

use crate::error::CliError;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracklog::{DailyEventCounts, EngineReport, IgnitionCycle, SkippedRow};

/// Flat row for the cycles table.
#[derive(Debug, Serialize)]
struct CycleRow {
    index: usize,
    on_time: String,
    on_line: usize,
    on_odometer: Option<f64>,
    off_time: Option<String>,
    off_line: Option<usize>,
    off_odometer: Option<f64>,
    on_secs: Option<i64>,
    off_secs: Option<i64>,
}

impl From<&IgnitionCycle> for CycleRow {
    fn from(cycle: &IgnitionCycle) -> Self {
        Self {
            index: cycle.index,
            on_time: cycle.on.timestamp.to_string(),
            on_line: cycle.on.line,
            on_odometer: cycle.on.odometer,
            off_time: cycle.off.map(|b| b.timestamp.to_string()),
            off_line: cycle.off.map(|b| b.line),
            off_odometer: cycle.off.and_then(|b| b.odometer),
            on_secs: cycle.on_secs,
            off_secs: cycle.off_secs,
        }
    }
}

/// Flat row for the skipped rows table.
#[derive(Debug, Serialize)]
struct SkippedRowOut {
    line: usize,
    reason: String,
}

impl From<&SkippedRow> for SkippedRowOut {
    fn from(row: &SkippedRow) -> Self {
        Self {
            line: row.line,
            reason: row.reason.to_string(),
        }
    }
}

/// Write serializable rows as CSV with a header.
fn write_rows<W: Write, T: Serialize>(writer: W, rows: impl IntoIterator<Item = T>) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the per-day pivot: one column per label.
fn write_daily_counts<W: Write>(writer: W, counts: &DailyEventCounts) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_writer(writer);
    let mut header = vec!["day".to_string()];
    header.extend(counts.labels.iter().cloned());
    writer.write_record(&header)?;
    for row in &counts.rows {
        let mut record = vec![row.day.to_string()];
        record.extend(row.counts.iter().map(|c| c.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Output directory for one input file: `out_dir/<file stem>`.
pub fn report_dir(out_dir: &Path, source_name: &str) -> PathBuf {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string());
    out_dir.join(stem)
}

/// Write every table of a report. Returns the directory written.
pub fn write_report(out_dir: &Path, report: &EngineReport) -> Result<PathBuf, CliError> {
    let dir = report_dir(out_dir, &report.source_name);
    fs::create_dir_all(&dir)?;
    let create = |name: &str| fs::File::create(dir.join(name));

    write_rows(create("event_counts.csv")?, &report.event_counts)?;
    write_daily_counts(create("daily_counts.csv")?, &report.daily_counts)?;
    write_rows(
        create("cycles.csv")?,
        report.cycles.iter().map(CycleRow::from),
    )?;
    write_rows(create("cadence.csv")?, &report.cadence)?;
    write_rows(create("trips.csv")?, &report.trips)?;
    write_rows(create("daily_trips.csv")?, &report.daily_trips)?;
    write_rows(
        create("sequence_anomalies.csv")?,
        &report.sequence_anomalies,
    )?;
    write_rows(create("delays.csv")?, &report.delay.messages)?;
    write_rows(create("reboots.csv")?, &report.reboots)?;
    write_rows(create("speed_alerts.csv")?, &report.speed_alerts)?;
    write_rows(
        create("skipped_rows.csv")?,
        report.skipped.iter().map(SkippedRowOut::from),
    )?;

    fs::write(dir.join("report.json"), report.to_json_pretty()?)?;
    debug!("{}: tables written to {}", report.source_name, dir.display());
    Ok(dir)
}
