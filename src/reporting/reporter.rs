//! reporter.rs
//! Error reporting pipeline: drains the fault queue one event at a time and
//! delivers it as three acknowledged register writes (code, time low, time high).
//!
//! Exactly one request is outstanding at any time. There is no retry and no
//! timeout: a target that never acknowledges stalls the pipeline, and later
//! faults back up in the queue until it starts dropping them. Long waits are
//! logged and counted, nothing more.
//!
//! A write the target refuses parks the pipeline in `Blocked`. Only a reset
//! leaves it; no acknowledgment is ever matched to a write that was not issued.

use log::{debug, error, warn};

use crate::config::registers::Configuration;
use crate::reporting::error_queue::{ErrorEvent, ErrorQueue};
use crate::reporting::target::{
    ReportRequest, ReportTarget, REPORT_CODE_OFFSET, REPORT_TIME_HI_OFFSET, REPORT_TIME_LO_OFFSET,
};

/// Waiting this many ticks for one acknowledgment is reported as a stall.
pub const STALL_WARN_CYCLES: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportState {
    #[default]
    Idle,
    SendCode,
    SendTimeLow,
    SendTimeHigh,
    /// The target refused a write. Nothing is polled until reset.
    Blocked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterCounters {
    pub delivered: u64,
    pub writes_acked: u64,
    pub issue_failures: u64,
    /// Ticks spent waiting past `STALL_WARN_CYCLES` on a single request.
    pub stalled_cycles: u64,
}

pub struct ErrorReporter {
    state: ReportState,
    current: Option<ErrorEvent>,
    waiting: u64,
    warned: bool,
    stall_warn_after: u64,
    counters: ReporterCounters,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::with_stall_threshold(STALL_WARN_CYCLES)
    }

    pub fn with_stall_threshold(cycles: u64) -> Self {
        Self {
            state: ReportState::Idle,
            current: None,
            waiting: 0,
            warned: false,
            stall_warn_after: cycles,
            counters: ReporterCounters::default(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::with_stall_threshold(self.stall_warn_after);
    }

    #[inline]
    pub fn state(&self) -> ReportState {
        self.state
    }

    /// Event currently being delivered.
    pub fn in_flight(&self) -> Option<ErrorEvent> {
        self.current
    }

    pub fn counters(&self) -> &ReporterCounters {
        &self.counters
    }

    /// Advance one tick. Returns the event whose last write was acknowledged this tick.
    pub fn tick<T: ReportTarget>(
        &mut self,
        config: &Configuration,
        errors: &ErrorQueue,
        target: &mut T,
    ) -> Option<ErrorEvent> {
        match self.state {
            ReportState::Idle => {
                if let Some(event) = errors.try_dequeue() {
                    self.current = Some(event);
                    self.state = self.send(
                        config,
                        target,
                        REPORT_CODE_OFFSET,
                        event.code.code(),
                        ReportState::SendCode,
                    );
                }
                None
            }
            ReportState::SendCode => {
                if self.acked(target) {
                    let low = self.timestamp() as u32;
                    self.state = self.send(
                        config,
                        target,
                        REPORT_TIME_LO_OFFSET,
                        low,
                        ReportState::SendTimeLow,
                    );
                }
                None
            }
            ReportState::SendTimeLow => {
                if self.acked(target) {
                    let high = (self.timestamp() >> 32) as u32;
                    self.state = self.send(
                        config,
                        target,
                        REPORT_TIME_HI_OFFSET,
                        high,
                        ReportState::SendTimeHigh,
                    );
                }
                None
            }
            ReportState::SendTimeHigh => {
                if !self.acked(target) {
                    return None;
                }
                self.state = ReportState::Idle;
                let done = self.current.take();
                if let Some(event) = done {
                    self.counters.delivered += 1;
                    debug!("[Reporter] delivered {:?}", event);
                }
                done
            }
            ReportState::Blocked => {
                self.wait();
                None
            }
        }
    }

    fn timestamp(&self) -> u64 {
        self.current.map(|e| e.timestamp).unwrap_or_default()
    }

    /// Issue one write. Returns `next` if the target took it, `Blocked` otherwise.
    fn send<T: ReportTarget>(
        &mut self,
        config: &Configuration,
        target: &mut T,
        offset: u32,
        data: u32,
        next: ReportState,
    ) -> ReportState {
        let dest = &config.error_target;
        let req = ReportRequest {
            port: dest.port,
            remote_epid: dest.remote_epid,
            remote_port: dest.remote_port,
            addr: dest.base_address.wrapping_add(offset),
            data,
        };
        self.waiting = 0;
        self.warned = false;
        match target.issue(req) {
            Ok(()) => next,
            Err(e) => {
                self.counters.issue_failures += 1;
                error!(
                    "[Reporter] write to {:#x} failed: {}; reporting blocked until reset",
                    req.addr, e
                );
                ReportState::Blocked
            }
        }
    }

    fn acked<T: ReportTarget>(&mut self, target: &mut T) -> bool {
        if target.poll_ack() {
            self.counters.writes_acked += 1;
            self.waiting = 0;
            return true;
        }
        self.wait();
        false
    }

    fn wait(&mut self) {
        self.waiting += 1;
        if self.waiting <= self.stall_warn_after {
            return;
        }
        self.counters.stalled_cycles += 1;
        if !self.warned {
            self.warned = true;
            warn!(
                "[Reporter] no acknowledgment after {} cycles in {:?}; reporting stalled",
                self.stall_warn_after, self.state
            );
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::registers::ErrorTarget;
    use crate::reporting::error_queue::ErrorCode;
    use crate::reporting::target::MemoryTarget;

    fn config() -> Configuration {
        Configuration {
            error_target: ErrorTarget {
                port: 5,
                remote_epid: 0x22,
                remote_port: 7,
                base_address: 0x100,
            },
            ..Configuration::default()
        }
    }

    #[test]
    fn three_writes_per_event() {
        let cfg = config();
        let q = ErrorQueue::with_capacity(4);
        let mut target = MemoryTarget::with_latency(0);
        let mut rep = ErrorReporter::new();
        let ev = ErrorEvent::new(ErrorCode::LateData, 0x1_2345_6789);
        q.try_enqueue(ev);

        assert_eq!(rep.tick(&cfg, &q, &mut target), None);
        assert_eq!(rep.state(), ReportState::SendCode);
        assert_eq!(rep.tick(&cfg, &q, &mut target), None);
        assert_eq!(rep.tick(&cfg, &q, &mut target), None);
        assert_eq!(rep.tick(&cfg, &q, &mut target), Some(ev));
        assert_eq!(rep.state(), ReportState::Idle);

        let writes: Vec<(u32, u32)> = target.issued().iter().map(|r| (r.addr, r.data)).collect();
        assert_eq!(writes, vec![(0x100, 2), (0x108, 0x2345_6789), (0x10C, 0x1)]);
        assert!(target
            .issued()
            .iter()
            .all(|r| r.port == 5 && r.remote_epid == 0x22 && r.remote_port == 7));
    }

    #[test]
    fn waits_for_each_ack() {
        let cfg = config();
        let q = ErrorQueue::with_capacity(4);
        let mut target = MemoryTarget::with_latency(3);
        let mut rep = ErrorReporter::new();
        q.try_enqueue(ErrorEvent::new(ErrorCode::Underrun, 9));

        rep.tick(&cfg, &q, &mut target);
        for _ in 0..3 {
            rep.tick(&cfg, &q, &mut target);
            assert_eq!(rep.state(), ReportState::SendCode);
            assert_eq!(target.issued().len(), 1);
        }
        rep.tick(&cfg, &q, &mut target);
        assert_eq!(rep.state(), ReportState::SendTimeLow);
        assert_eq!(target.issued().len(), 2);
    }

    #[test]
    fn silent_target_stalls_and_is_counted() {
        let cfg = config();
        let q = ErrorQueue::with_capacity(2);
        let mut target = MemoryTarget::never_ack();
        let mut rep = ErrorReporter::with_stall_threshold(5);
        q.try_enqueue(ErrorEvent::new(ErrorCode::Underrun, 1));
        q.try_enqueue(ErrorEvent::new(ErrorCode::Underrun, 2));

        for _ in 0..20 {
            assert_eq!(rep.tick(&cfg, &q, &mut target), None);
        }
        assert_eq!(rep.state(), ReportState::SendCode);
        assert_eq!(target.issued().len(), 1);
        assert_eq!(q.len(), 1);
        assert_eq!(rep.counters().stalled_cycles, 14);
    }

    #[test]
    fn zero_threshold_counts_from_the_first_wait() {
        let cfg = config();
        let q = ErrorQueue::with_capacity(2);
        let mut target = MemoryTarget::never_ack();
        let mut rep = ErrorReporter::with_stall_threshold(0);
        q.try_enqueue(ErrorEvent::new(ErrorCode::Underrun, 1));

        rep.tick(&cfg, &q, &mut target);
        rep.tick(&cfg, &q, &mut target);
        assert_eq!(rep.counters().stalled_cycles, 1);
        assert!(rep.warned);
    }

    #[test]
    fn refused_write_blocks_and_never_takes_an_ack() {
        let cfg = config();
        let q = ErrorQueue::with_capacity(2);
        let mut target = MemoryTarget::with_latency(0);
        // Someone else's request is still outstanding on the target.
        let foreign = ReportRequest {
            port: 0,
            remote_epid: 0,
            remote_port: 0,
            addr: 0xF00,
            data: 9,
        };
        target.issue(foreign).unwrap();

        let mut rep = ErrorReporter::new();
        q.try_enqueue(ErrorEvent::new(ErrorCode::LateData, 4));
        rep.tick(&cfg, &q, &mut target);
        assert_eq!(rep.state(), ReportState::Blocked);
        assert_eq!(rep.counters().issue_failures, 1);

        for _ in 0..10 {
            assert_eq!(rep.tick(&cfg, &q, &mut target), None);
        }
        assert_eq!(rep.state(), ReportState::Blocked);
        assert_eq!(rep.counters().writes_acked, 0);
        // The foreign request was never polled on the reporter's behalf.
        assert!(target.is_outstanding());
        assert_eq!(target.issued(), &[foreign]);
    }

    #[test]
    fn reset_returns_to_idle_and_forgets_in_flight_event() {
        let cfg = config();
        let q = ErrorQueue::with_capacity(2);
        let mut target = MemoryTarget::never_ack();
        let mut rep = ErrorReporter::new();
        q.try_enqueue(ErrorEvent::new(ErrorCode::LateData, 3));
        rep.tick(&cfg, &q, &mut target);
        assert!(rep.in_flight().is_some());
        rep.reset();
        assert_eq!(rep.state(), ReportState::Idle);
        assert_eq!(rep.in_flight(), None);
    }
}
