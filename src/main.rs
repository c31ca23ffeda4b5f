//! # Transmit Admission Simulation Entry Point
//! Reproducible runs of the timed transmit core under random burst traffic.
//!
//! Orchestrates traffic generator → TxCore → fixed-rate consumer, with error
//! reports delivered to a sink thread over request/acknowledge channels.
//!
//! ## Modes
//! - **Single Run:** user-chosen policy, late-data and gap ratios.
//! - **Default Run:** per-packet policy with default traffic.
//! - **Policy Sweep:** same traffic under each error policy.
//!
//! ## Outputs
//! - `data/logs/error_reports_<policy>.csv`: every delivered report.
//! - `data/logs/run_summary.csv`: one row per run.

use std::io::{stdin, stdout, Write};
use std::sync::Arc;

use log::{error, info};
use parking_lot::Mutex;

use tx_admission::{
    config::registers::ErrorPolicy,
    sim::runner::{run_simulation, RunnerConfig},
    utils::{
        export::run_exports,
        metrics::{calculate_stats_u64, Metrics, SharedMetrics},
    },
};

const POLICY_SWEEP: &[ErrorPolicy] = &[ErrorPolicy::PerPacket, ErrorPolicy::PerBurst];

fn main() {
    env_logger::init();
    info!("=== TX ADMISSION SIMULATION START ===");

    loop {
        let choice = prompt_menu();
        match choice.as_str() {
            "1" => {
                let cfg = prompt_run_config();
                run_once(&cfg);
            }
            "2" | "" => {
                println!("Running default configuration.");
                run_once(&RunnerConfig::default());
            }
            "3" => {
                println!("Running policy sweep over {:?}", POLICY_SWEEP);
                for &policy in POLICY_SWEEP {
                    let cfg = RunnerConfig {
                        policy,
                        ..RunnerConfig::default()
                    };
                    run_once(&cfg);
                }
            }
            "4" => {
                println!("Exiting. Goodbye!");
                info!("=== TX ADMISSION SIMULATION FINISHED ===");
                return;
            }
            other => {
                println!("Unrecognized option '{}', please try again.", other);
            }
        }
    }
}

fn prompt_menu() -> String {
    println!("\n┌─────────────────────────────────────────────┐");
    println!("│     SELECT SIMULATION MODE                  │");
    println!("├─────────────────────────────────────────────┤");
    println!("│  1) Custom run                              │");
    println!("│  2) Default run (per-packet policy)         │");
    println!("│  3) Policy sweep [per_packet, per_burst]    │");
    println!("│  4) Exit                                    │");
    println!("└─────────────────────────────────────────────┘");
    print!("Select [1/2/3/4] (default: 2): ");
    read_line()
}

fn read_line() -> String {
    let _ = stdout().flush();
    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().to_string()
}

fn prompt_run_config() -> RunnerConfig {
    let mut cfg = RunnerConfig::default();

    print!("Error policy [packet/burst] (default: packet): ");
    if read_line().eq_ignore_ascii_case("burst") {
        cfg.policy = ErrorPolicy::PerBurst;
    }

    print!("Cycles [default: {}]: ", cfg.cycles);
    cfg.cycles = read_line().parse().unwrap_or(cfg.cycles);

    print!("Late-data ratio 0..1 [default: {}]: ", cfg.traffic.late_ratio);
    cfg.traffic.late_ratio = read_ratio(cfg.traffic.late_ratio);

    print!("Producer gap ratio 0..1 [default: {}]: ", cfg.traffic.gap_ratio);
    cfg.traffic.gap_ratio = read_ratio(cfg.traffic.gap_ratio);

    print!("Max ack delay in us [default: {}]: ", cfg.max_ack_delay_us);
    cfg.max_ack_delay_us = read_line().parse().unwrap_or(cfg.max_ack_delay_us);

    print!("Clock period in ns, empty for unpaced: ");
    cfg.clock_period_ns = read_line().parse().ok();

    cfg
}

fn read_ratio(default: f64) -> f64 {
    read_line()
        .parse::<f64>()
        .ok()
        .filter(|r| (0.0..=1.0).contains(r))
        .unwrap_or(default)
}

fn run_once(cfg: &RunnerConfig) {
    let metrics: SharedMetrics = Arc::new(Mutex::new(Metrics::default()));

    let outcome = match run_simulation(cfg, metrics.clone()) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("[Experiment] configuration failed: {}", e);
            return;
        }
    };

    run_exports(&cfg.output_dir, cfg.policy, &metrics, &outcome.reports);

    let s = outcome.stats;
    println!("\n── Run summary ({}) ──", cfg.policy.name());
    println!("  cycles            {}", s.cycles);
    println!("  bursts generated  {}", outcome.bursts);
    println!("  packets started   {}", s.packets_started);
    println!("  bursts completed  {}", s.bursts_completed);
    println!("  late data         {}", s.late);
    println!("  underruns         {}", s.underruns);
    println!("  beats discarded   {}", s.beats_discarded);
    println!("  events dropped    {}", s.dropped_events);
    println!("  reports delivered {}", s.reports_delivered);
    if s.report_issue_failures > 0 {
        println!("  refused writes    {}", s.report_issue_failures);
    }
    if let Some(lat) = calculate_stats_u64(&metrics.lock().report_latency) {
        println!(
            "  report latency    min={:.0} avg={:.1} max={:.0} cycles",
            lat.min, lat.mean, lat.max
        );
    }
    if outcome.stalled {
        println!("  WARNING: reporting stalled; pending events were never delivered");
    }
}
