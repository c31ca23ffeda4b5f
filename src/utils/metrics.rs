//! Run metrics for the simulation driver.
//!
//! Shared behind `Arc<Mutex<_>>` between the clock loop and the report sink thread.
//! Histories are bounded to `MAX_POINTS` entries per series.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::engine::EngineStats;
use crate::reporting::error_queue::ErrorCode;

pub const MAX_POINTS: usize = 1_000;

#[derive(Debug, Default, Clone)]
pub struct Metrics {
    /// Clock ticks between a fault being raised and its report landing at the sink.
    pub report_latency: VecDeque<u64>,
    /// Error queue occupancy, sampled once per `QUEUE_SAMPLE_EVERY` ticks by the runner.
    pub queue_depth: VecDeque<u64>,

    /// Faults seen by the sink, per code.
    pub late_reported: u64,
    pub underrun_reported: u64,

    /// Final engine counters of the last run.
    pub engine: EngineStats,
}

impl Metrics {
    pub fn record_report(&mut self, code: ErrorCode, latency: u64) {
        match code {
            ErrorCode::LateData => self.late_reported += 1,
            ErrorCode::Underrun => self.underrun_reported += 1,
        }
        push_capped_u64(&mut self.report_latency, latency);
    }

    pub fn reported(&self) -> u64 {
        self.late_reported + self.underrun_reported
    }
}

pub type SharedMetrics = Arc<Mutex<Metrics>>;

/// Appends value; drops the oldest entry once at capacity.
#[inline]
pub fn push_capped_u64(buf: &mut VecDeque<u64>, val: u64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

/// min/max/mean over a u64 series; `None` when empty.
pub fn calculate_stats_u64<'a, I>(data: I) -> Option<Stats>
where
    I: IntoIterator<Item = &'a u64>,
{
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &x in data {
        let x = x as f64;
        min = min.min(x);
        max = max.max(x);
        sum += x;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(Stats {
        min,
        max,
        mean: sum / count as f64,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_capped() {
        let mut buf = VecDeque::new();
        for i in 0..(MAX_POINTS as u64 + 10) {
            push_capped_u64(&mut buf, i);
        }
        assert_eq!(buf.len(), MAX_POINTS);
        assert_eq!(buf.front(), Some(&10));
    }

    #[test]
    fn stats_over_series() {
        let data: VecDeque<u64> = [4, 8, 12].into_iter().collect();
        let s = calculate_stats_u64(&data).unwrap();
        assert_eq!((s.min, s.max, s.mean, s.count), (4.0, 12.0, 8.0, 3));
        assert!(calculate_stats_u64(&VecDeque::<u64>::new()).is_none());
    }

    #[test]
    fn reports_are_counted_per_code() {
        let mut m = Metrics::default();
        m.record_report(ErrorCode::LateData, 3);
        m.record_report(ErrorCode::Underrun, 5);
        m.record_report(ErrorCode::Underrun, 7);
        assert_eq!((m.late_reported, m.underrun_reported, m.reported()), (1, 2, 3));
        assert_eq!(m.report_latency.len(), 3);
    }
}
