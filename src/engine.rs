//! engine.rs
//! The transmit core: admission controller, error queue, error reporter and
//! configuration store stepped together on one clock.
//!
//! Within a tick admission runs before reporting, so a queue that is full at
//! the start of the tick rejects a new fault even if reporting frees a slot later
//! in the same tick.

use log::{debug, info};

use crate::admission::controller::{AdmissionController, TxOutput, TxState};
use crate::admission::stream::InputStream;
use crate::config::registers::{
    ConfigRegister, ConfigStore, Configuration, CtrlRequest, CtrlResponse,
};
use crate::reporting::error_queue::{ErrorEvent, ErrorQueue, ERROR_QUEUE_DEPTH};
use crate::reporting::reporter::{ErrorReporter, ReportState};
use crate::reporting::target::ReportTarget;

/// Aggregate counters across all components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub cycles: u64,
    pub packets_started: u64,
    pub bursts_completed: u64,
    pub late: u64,
    pub underruns: u64,
    pub beats_sent: u64,
    pub beats_discarded: u64,
    pub dropped_events: u64,
    pub queued_events: usize,
    pub reports_delivered: u64,
    pub report_writes_acked: u64,
    /// Report writes the target refused; each one blocks reporting until reset.
    pub report_issue_failures: u64,
    pub stalled_cycles: u64,
}

/// Per-tick result: consumer output plus any report completed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickResult<const SPC: usize> {
    pub output: TxOutput<SPC>,
    pub delivered: Option<ErrorEvent>,
}

pub struct TxCore<T: ReportTarget, const SPC: usize = 1> {
    config: ConfigStore,
    admission: AdmissionController<SPC>,
    errors: ErrorQueue,
    reporter: ErrorReporter,
    target: T,
    cycles: u64,
}

impl<T: ReportTarget, const SPC: usize> TxCore<T, SPC> {
    pub fn new(target: T) -> Self {
        Self::with_queue_depth(target, ERROR_QUEUE_DEPTH)
    }

    /// Core with an error queue of `depth` events. A depth of zero is raised to one.
    pub fn with_queue_depth(target: T, depth: usize) -> Self {
        Self {
            config: ConfigStore::new(),
            admission: AdmissionController::new(),
            errors: ErrorQueue::with_capacity(depth.max(1)),
            reporter: ErrorReporter::new(),
            target,
            cycles: 0,
        }
    }

    /// Replace the reporter's stall warning threshold (ticks per request).
    pub fn with_stall_threshold(mut self, cycles: u64) -> Self {
        self.reporter = ErrorReporter::with_stall_threshold(cycles);
        self
    }

    /// One clock tick at time `now`. `pull` is the consumer's strobe for this tick.
    pub fn tick<I: InputStream<SPC>>(&mut self, now: u64, pull: bool, input: &mut I) -> TickResult<SPC> {
        let config = *self.config.snapshot();
        let output = self.admission.tick(now, pull, input, &config, &self.errors);
        let delivered = self.reporter.tick(&config, &self.errors, &mut self.target);
        self.cycles += 1;
        TickResult { output, delivered }
    }

    /// Synchronous reset of every component, configuration included.
    /// A report write still in flight is abandoned at the target.
    pub fn reset(&mut self) {
        self.admission.reset();
        self.errors.clear();
        self.reporter.reset();
        self.target.abandon();
        self.config.reset();
        self.cycles = 0;
        info!("[TxCore] reset");
    }

    /// Serve a typed control request. `None` means no acknowledgment.
    pub fn handle_ctrl(&mut self, req: CtrlRequest) -> Option<CtrlResponse> {
        match req {
            CtrlRequest::Read { reg: reg @ ConfigRegister::TxStatus } => Some(CtrlResponse {
                reg,
                data: self.admission.is_transmitting() as u32,
            }),
            CtrlRequest::Read { reg: reg @ ConfigRegister::DroppedEvents } => Some(CtrlResponse {
                reg,
                data: self.errors.dropped().min(u32::MAX as u64) as u32,
            }),
            other => self.config.handle(other),
        }
    }

    /// Serve a raw control-port transaction. Unknown or read-only targets are ignored.
    pub fn handle_addressed(&mut self, addr: u32, is_write: bool, data: u32) -> Option<CtrlResponse> {
        match CtrlRequest::decode(addr, is_write, data) {
            Ok(req) => self.handle_ctrl(req),
            Err(e) => {
                debug!("[TxCore] control request ignored: {}", e);
                None
            }
        }
    }

    pub fn configuration(&self) -> &Configuration {
        self.config.snapshot()
    }

    pub fn state(&self) -> TxState {
        self.admission.state()
    }

    pub fn report_state(&self) -> ReportState {
        self.reporter.state()
    }

    pub fn is_transmitting(&self) -> bool {
        self.admission.is_transmitting()
    }

    pub fn error_queue(&self) -> &ErrorQueue {
        &self.errors
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn stats(&self) -> EngineStats {
        let a = self.admission.counters();
        let r = self.reporter.counters();
        EngineStats {
            cycles: self.cycles,
            packets_started: a.packets_started,
            bursts_completed: a.bursts_completed,
            late: a.late,
            underruns: a.underruns,
            beats_sent: a.beats_sent,
            beats_discarded: a.beats_discarded,
            dropped_events: self.errors.dropped(),
            queued_events: self.errors.len(),
            reports_delivered: r.delivered,
            report_writes_acked: r.writes_acked,
            report_issue_failures: r.issue_failures,
            stalled_cycles: r.stalled_cycles,
        }
    }
}
