//! runner.rs
//! Drives one simulated run: random traffic → TxCore → fixed-rate consumer,
//! with error reports delivered to a sink thread over channels.
//!
//! The clock is a plain counter. When `clock_period_ns` is set each tick is
//! paced with a spin sleeper; otherwise ticks run back to back.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::{error, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::admission::stream::{BeatQueue, Sample};
use crate::config::registers::{ConfigRegister, CtrlRequest, ErrorPolicy, ErrorTarget};
use crate::engine::{EngineStats, TxCore};
use crate::error::RegisterError;
use crate::reporting::error_queue::ERROR_QUEUE_DEPTH;
use crate::reporting::reporter::ReportState;
use crate::reporting::target::{ChannelTarget, ReportTarget};
use crate::sim::sink::spawn_report_sink;
use crate::sim::stimulus::{TrafficGenerator, TrafficProfile};
use crate::utils::{
    export::ReportRow,
    metrics::{push_capped_u64, SharedMetrics},
};

/// Samples per cycle used by the runner.
pub const RUNNER_SPC: usize = 2;

pub const DEFAULT_CYCLES: u64 = 200_000;
pub const DEFAULT_IDLE_VALUE: Sample = 0x0000_0000;
pub const DEFAULT_MAX_ACK_DELAY_US: u64 = 0;
pub const DEFAULT_SEED: u64 = 0x5EED;
/// First clock value; leaves room for deadlines stamped in the past.
pub const START_TIME: u64 = 1_000;
/// Upper bound on ticks spent flushing pending reports after traffic stops.
pub const DRAIN_LIMIT_CYCLES: u64 = 1_000_000;
pub const QUEUE_SAMPLE_EVERY: u64 = 64;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub cycles: u64,
    pub policy: ErrorPolicy,
    pub idle_value: Sample,
    pub error_target: ErrorTarget,
    pub queue_depth: usize,
    pub traffic: TrafficProfile,
    /// Consumer pulls on every n-th tick.
    pub pull_every: u64,
    pub max_ack_delay_us: u64,
    pub clock_period_ns: Option<u64>,
    pub seed: u64,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cycles: DEFAULT_CYCLES,
            policy: ErrorPolicy::PerPacket,
            idle_value: DEFAULT_IDLE_VALUE,
            error_target: ErrorTarget {
                port: 1,
                remote_epid: 0x10,
                remote_port: 2,
                base_address: 0x1000,
            },
            queue_depth: ERROR_QUEUE_DEPTH,
            traffic: TrafficProfile::default(),
            pull_every: 1,
            max_ack_delay_us: DEFAULT_MAX_ACK_DELAY_US,
            clock_period_ns: None,
            seed: DEFAULT_SEED,
            output_dir: PathBuf::from("data/logs"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub stats: EngineStats,
    pub reports: Vec<ReportRow>,
    pub bursts: u64,
    /// Reporting never went idle within `DRAIN_LIMIT_CYCLES`.
    pub stalled: bool,
}

/// Program the core through its control port, checking every acknowledgment.
pub fn configure<T: ReportTarget, const SPC: usize>(
    core: &mut TxCore<T, SPC>,
    cfg: &RunnerConfig,
) -> Result<(), RegisterError> {
    let dest = &cfg.error_target;
    let writes = [
        (ConfigRegister::IdleValue, cfg.idle_value),
        (ConfigRegister::ErrorPolicy, cfg.policy.bits()),
        (ConfigRegister::ErrPort, dest.port as u32),
        (ConfigRegister::ErrRemoteEpid, dest.remote_epid as u32),
        (ConfigRegister::ErrRemotePort, dest.remote_port as u32),
        (ConfigRegister::ErrBaseAddress, dest.base_address),
    ];
    for (reg, data) in writes {
        core.handle_ctrl(CtrlRequest::Write { reg, data })
            .ok_or(RegisterError::NoAck(reg.addr()))?;
    }
    Ok(())
}

pub fn run_simulation(cfg: &RunnerConfig, metrics: SharedMetrics) -> Result<RunOutcome, RegisterError> {
    info!(
        "[Runner] starting: cycles={} policy={} late_ratio={} gap_ratio={}",
        cfg.cycles,
        cfg.policy.name(),
        cfg.traffic.late_ratio,
        cfg.traffic.gap_ratio
    );

    let clock = Arc::new(AtomicU64::new(START_TIME));
    let (target, remote) = ChannelTarget::pair();
    let sink = spawn_report_sink(
        remote,
        cfg.error_target.base_address,
        cfg.max_ack_delay_us,
        clock.clone(),
        metrics.clone(),
        cfg.seed ^ 0xA5A5,
    );

    let mut core: TxCore<ChannelTarget, RUNNER_SPC> = TxCore::with_queue_depth(target, cfg.queue_depth);
    configure(&mut core, cfg)?;

    let mut generator = TrafficGenerator::<RUNNER_SPC>::new(cfg.traffic.clone(), cfg.seed);
    let mut input = BeatQueue::<RUNNER_SPC>::new();

    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    let period = cfg.clock_period_ns.map(Duration::from_nanos);
    let mut next_deadline = Instant::now();

    // ========================================================================
    // Traffic phase
    // ========================================================================
    let pull_every = cfg.pull_every.max(1);
    let mut now = START_TIME;
    for i in 0..cfg.cycles {
        if let Some(period) = period {
            next_deadline += period;
            let wall = Instant::now();
            if wall < next_deadline {
                sleeper.sleep(next_deadline - wall);
            }
        }

        clock.store(now, Ordering::Release);
        generator.fill(now, &mut input);
        core.tick(now, i % pull_every == 0, &mut input);

        if i % QUEUE_SAMPLE_EVERY == 0 {
            let depth = core.error_queue().len() as u64;
            push_capped_u64(&mut metrics.lock().queue_depth, depth);
        }
        now += 1;
    }

    // ========================================================================
    // Flush phase: no new traffic, keep the clock running until reporting is idle
    // ========================================================================
    let mut flushed = 0;
    while !(core.error_queue().is_empty() && core.report_state() == ReportState::Idle) {
        if flushed >= DRAIN_LIMIT_CYCLES || core.report_state() == ReportState::Blocked {
            break;
        }
        clock.store(now, Ordering::Release);
        core.tick(now, true, &mut input);
        now += 1;
        flushed += 1;
    }
    let stalled = core.report_state() != ReportState::Idle || !core.error_queue().is_empty();
    if stalled {
        warn!(
            "[Runner] reporting did not go idle after {} flush cycles ({} events still queued)",
            flushed,
            core.error_queue().len()
        );
    }

    let stats = core.stats();
    metrics.lock().engine = stats;

    // Dropping the core hangs up on the sink.
    drop(core);
    let reports = match sink.join() {
        Ok(rows) => rows,
        Err(_) => {
            error!("[Runner] report sink thread panicked");
            Vec::new()
        }
    };

    info!(
        "[Runner] done: packets={} late={} underruns={} dropped={} delivered={}",
        stats.packets_started, stats.late, stats.underruns, stats.dropped_events, stats.reports_delivered
    );

    Ok(RunOutcome {
        stats,
        reports,
        bursts: generator.bursts(),
        stalled,
    })
}
