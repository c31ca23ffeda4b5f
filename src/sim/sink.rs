//! sink.rs
//! Remote report target running on its own thread.
//!
//! Receives report writes over the channel pair, reassembles events, stamps
//! them with the engine clock at delivery and acknowledges each write
//! (optionally after a random delay). Exits once the engine side hangs up.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error};
use rand::{rngs::StdRng, Rng, SeedableRng};
use spin_sleep::SpinSleeper;

use crate::reporting::assembler::ReportAssembler;
use crate::reporting::target::RemoteEndpoint;
use crate::utils::{export::ReportRow, metrics::SharedMetrics};

const SINK_POLL_MS: u64 = 5;

pub fn spawn_report_sink(
    remote: RemoteEndpoint,
    base_address: u32,
    max_ack_delay_us: u64,
    clock: Arc<AtomicU64>,
    metrics: SharedMetrics,
    seed: u64,
) -> JoinHandle<Vec<ReportRow>> {
    thread::spawn(move || {
        let mut assembler = ReportAssembler::new(base_address);
        let mut rng = StdRng::seed_from_u64(seed);
        let sleeper = SpinSleeper::default();
        let mut rows = Vec::new();

        loop {
            let req = match remote.recv_timeout(Duration::from_millis(SINK_POLL_MS)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break, // engine side dropped its target
            };

            if let Some(event) = assembler.write(&req) {
                let delivered_at = clock.load(Ordering::Acquire);
                let latency = delivered_at.saturating_sub(event.timestamp);
                rows.push(ReportRow {
                    seq: rows.len() as u64 + 1,
                    code: event.code,
                    fault_time: event.timestamp,
                    delivered_at,
                    latency,
                });
                metrics.lock().record_report(event.code, latency);
            }

            if max_ack_delay_us > 0 {
                let delay = rng.random_range(0..=max_ack_delay_us);
                sleeper.sleep(Duration::from_micros(delay));
            }

            if let Err(e) = remote.ack(&req) {
                error!("[ReportSink] ack failed: {}", e);
                break;
            }
        }

        debug!(
            "[ReportSink] exiting. reports={} malformed={}",
            rows.len(),
            assembler.malformed()
        );
        rows
    })
}
