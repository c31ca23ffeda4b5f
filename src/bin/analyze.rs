//! Error report analysis: reads an exported report CSV → prints per-code counts,
//! delivery latency and spacing between consecutive faults, with ASCII bars.
//!
//! Usage: `analyze [path]` (default `data/logs/error_reports_per_packet.csv`).

use std::{collections::BTreeMap, path::PathBuf};

use tx_admission::{
    reporting::error_queue::ErrorCode,
    utils::{
        export::{read_reports, ReportRow},
        metrics::calculate_stats_u64,
    },
};

const DEFAULT_REPORTS: &str = "data/logs/error_reports_per_packet.csv";
const BAR_WIDTH: usize = 40;

fn main() {
    env_logger::init();
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS));

    println!(" Error Report Analysis: {}", path.display());
    println!("============================\n");

    let rows = match read_reports(&path) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!(" Failed to read {}: {}", path.display(), e);
            return;
        }
    };
    if rows.is_empty() {
        eprintln!(" No reports found. Run a simulation first!");
        return;
    }

    print_counts(&rows);
    print_latency(&rows);
    print_spacing(&rows);
}

fn print_counts(rows: &[ReportRow]) {
    let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
    for row in rows {
        *counts.entry(row.code.name()).or_insert(0) += 1;
    }
    let max = counts.values().copied().max().unwrap_or(1);

    println!("FAULTS BY CODE");
    for (name, count) in &counts {
        println!("  {:<10} {:>8} {}", name, count, bar(*count, max));
    }
    println!();
}

fn print_latency(rows: &[ReportRow]) {
    println!("DELIVERY LATENCY (cycles from fault to last write)");
    for code in [ErrorCode::LateData, ErrorCode::Underrun] {
        let latencies: Vec<u64> = rows.iter().filter(|r| r.code == code).map(|r| r.latency).collect();
        match calculate_stats_u64(&latencies) {
            Some(s) => println!(
                "  {:<10} min={:<6.0} avg={:<8.1} max={:<6.0} n={}",
                code.name(),
                s.min,
                s.mean,
                s.max,
                s.count
            ),
            None => println!("  {:<10} -", code.name()),
        }
    }
    println!();
}

fn print_spacing(rows: &[ReportRow]) {
    let gaps: Vec<u64> = rows
        .windows(2)
        .map(|w| w[1].fault_time.saturating_sub(w[0].fault_time))
        .collect();
    println!("SPACING BETWEEN CONSECUTIVE FAULTS");
    match calculate_stats_u64(&gaps) {
        Some(s) => println!("  min={:.0} avg={:.1} max={:.0} cycles", s.min, s.mean, s.max),
        None => println!("  (single report)"),
    }

    let out_of_order = rows.windows(2).filter(|w| w[1].fault_time < w[0].fault_time).count();
    if out_of_order > 0 {
        println!("  WARNING: {} reports arrived out of fault order", out_of_order);
    }
}

fn bar(value: u64, max: u64) -> String {
    let len = ((value as f64 / max.max(1) as f64) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(len)
}
