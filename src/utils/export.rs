//! CSV export of simulation results.
//!
//! - `error_reports_<policy>.csv`: every report assembled at the sink, in delivery order
//! - `run_summary.csv`: one appended row per run (header written on first use)

use std::{
    fs::{create_dir_all, File, OpenOptions},
    path::Path,
};

use csv::{ReaderBuilder, WriterBuilder};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::registers::ErrorPolicy;
use crate::error::ExportError;
use crate::reporting::error_queue::ErrorCode;
use crate::utils::metrics::{calculate_stats_u64, SharedMetrics};

/// One delivered error report as seen by the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub seq: u64,
    pub code: ErrorCode,
    /// Clock value stamped into the report.
    pub fault_time: u64,
    /// Clock value when the last write landed at the sink.
    pub delivered_at: u64,
    pub latency: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SummaryRow {
    policy: String,
    cycles: u64,
    packets_started: u64,
    bursts_completed: u64,
    late: u64,
    underruns: u64,
    dropped_events: u64,
    reports_delivered: u64,
    report_writes_acked: u64,
    report_issue_failures: u64,
    stalled_cycles: u64,
    latency_avg: f64,
    latency_max: f64,
}

fn ensure_parent(path: &Path) -> Result<(), ExportError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            create_dir_all(dir)?;
        }
    }
    Ok(())
}

pub fn write_reports(path: &Path, rows: &[ReportRow]) -> Result<(), ExportError> {
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new().from_writer(File::create(path)?);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_reports(path: &Path) -> Result<Vec<ReportRow>, ExportError> {
    let mut rdr = ReaderBuilder::new().from_path(path)?;
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Append one summary row for this run.
pub fn append_summary(path: &Path, policy: ErrorPolicy, metrics: &SharedMetrics) -> Result<(), ExportError> {
    ensure_parent(path)?;
    let file_exists = path.exists();

    let row = {
        let m = metrics.lock();
        let latency = calculate_stats_u64(&m.report_latency);
        SummaryRow {
            policy: policy.name().to_string(),
            cycles: m.engine.cycles,
            packets_started: m.engine.packets_started,
            bursts_completed: m.engine.bursts_completed,
            late: m.engine.late,
            underruns: m.engine.underruns,
            dropped_events: m.engine.dropped_events,
            reports_delivered: m.engine.reports_delivered,
            report_writes_acked: m.engine.report_writes_acked,
            report_issue_failures: m.engine.report_issue_failures,
            stalled_cycles: m.engine.stalled_cycles,
            latency_avg: latency.as_ref().map(|s| s.mean).unwrap_or(0.0),
            latency_max: latency.as_ref().map(|s| s.max).unwrap_or(0.0),
        }
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut wtr = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(&row)?;
    wtr.flush()?;
    Ok(())
}

/// Write both outputs for one run into `dir`; failures are logged, not fatal.
pub fn run_exports(dir: &Path, policy: ErrorPolicy, metrics: &SharedMetrics, rows: &[ReportRow]) {
    let reports_path = dir.join(format!("error_reports_{}.csv", policy.name()));
    match write_reports(&reports_path, rows) {
        Ok(()) => info!("{} error reports exported to {:?}", rows.len(), reports_path),
        Err(e) => error!("Failed to export error reports: {}", e),
    }

    let summary_path = dir.join("run_summary.csv");
    match append_summary(&summary_path, policy, metrics) {
        Ok(()) => info!("Run summary appended to {:?}", summary_path),
        Err(e) => error!("Failed to append run summary: {}", e),
    }
}
