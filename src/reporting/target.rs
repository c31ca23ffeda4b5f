//! target.rs
//! Outbound side of error reporting: typed write requests and the targets that acknowledge them.
//!
//! - `MemoryTarget`: in-process target with a fixed ack latency, or none (stall injection)
//! - `ChannelTarget`: hands requests to a remote endpoint thread over crossbeam channels

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TargetError;

/// Offsets of the three report writes relative to the configured base address.
pub const REPORT_CODE_OFFSET: u32 = 0;
pub const REPORT_TIME_LO_OFFSET: u32 = 8;
pub const REPORT_TIME_HI_OFFSET: u32 = 12;

/// One register write addressed to the remote target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub port: u16,
    pub remote_epid: u16,
    pub remote_port: u16,
    pub addr: u32,
    pub data: u32,
}

/// Request/acknowledge interface of the remote target.
///
/// The reporter keeps at most one request outstanding: it calls `issue`, then
/// `poll_ack` once per tick until it returns true.
pub trait ReportTarget {
    fn issue(&mut self, req: ReportRequest) -> Result<(), TargetError>;
    fn poll_ack(&mut self) -> bool;
    /// Forget the outstanding request, if any. Its acknowledgment must never
    /// be returned by a later `poll_ack`.
    fn abandon(&mut self);
}

/// In-process target recording every write it receives.
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    latency: Option<u64>,
    pending: Option<(ReportRequest, u64)>,
    issued: Vec<ReportRequest>,
    acked: usize,
}

impl MemoryTarget {
    /// Acknowledge each request `latency` polls after it was issued (0 = first poll).
    pub fn with_latency(latency: u64) -> Self {
        Self {
            latency: Some(latency),
            pending: None,
            issued: Vec::new(),
            acked: 0,
        }
    }

    /// Target that accepts requests but never acknowledges them.
    pub fn never_ack() -> Self {
        Self {
            latency: None,
            ..Self::with_latency(0)
        }
    }

    /// Change the ack latency. `None` stops acknowledging; `Some` also
    /// releases a request left outstanding by a silent period.
    pub fn set_latency(&mut self, latency: Option<u64>) {
        self.latency = latency;
        if let (Some(l), Some((_, remaining))) = (latency, self.pending.as_mut()) {
            *remaining = (*remaining).min(l);
        }
    }

    /// Every request issued so far, in issue order.
    pub fn issued(&self) -> &[ReportRequest] {
        &self.issued
    }

    pub fn acked(&self) -> usize {
        self.acked
    }

    pub fn is_outstanding(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for MemoryTarget {
    fn default() -> Self {
        Self::with_latency(0)
    }
}

impl ReportTarget for MemoryTarget {
    fn issue(&mut self, req: ReportRequest) -> Result<(), TargetError> {
        if self.pending.is_some() {
            return Err(TargetError::Busy);
        }
        self.issued.push(req);
        // Without a latency the request stays outstanding forever.
        self.pending = Some((req, self.latency.unwrap_or(u64::MAX)));
        Ok(())
    }

    fn poll_ack(&mut self) -> bool {
        if self.latency.is_none() {
            return false;
        }
        match self.pending.as_mut() {
            Some((_, 0)) => {
                self.pending = None;
                self.acked += 1;
                true
            }
            Some((_, remaining)) => {
                *remaining -= 1;
                false
            }
            None => false,
        }
    }

    fn abandon(&mut self) {
        if let Some((req, _)) = self.pending.take() {
            debug!("[MemoryTarget] abandoned write to {:#x}", req.addr);
        }
    }
}

/// Acknowledgment sent back by the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportAck {
    pub addr: u32,
}

/// Reporter-side half of a channel pair.
pub struct ChannelTarget {
    req_tx: Sender<ReportRequest>,
    ack_rx: Receiver<ReportAck>,
    outstanding: bool,
    // Acks still owed by the remote for abandoned requests; discarded on arrival.
    stale_acks: usize,
}

/// Remote half: receives requests and sends acknowledgments.
pub struct RemoteEndpoint {
    req_rx: Receiver<ReportRequest>,
    ack_tx: Sender<ReportAck>,
}

impl ChannelTarget {
    /// One-deep channels in each direction; the protocol never has more in flight.
    pub fn pair() -> (ChannelTarget, RemoteEndpoint) {
        let (req_tx, req_rx) = bounded(1);
        let (ack_tx, ack_rx) = bounded(1);
        (
            ChannelTarget {
                req_tx,
                ack_rx,
                outstanding: false,
                stale_acks: 0,
            },
            RemoteEndpoint { req_rx, ack_tx },
        )
    }
}

impl ReportTarget for ChannelTarget {
    fn issue(&mut self, req: ReportRequest) -> Result<(), TargetError> {
        if self.outstanding {
            return Err(TargetError::Busy);
        }
        match self.req_tx.try_send(req) {
            Ok(()) => {
                self.outstanding = true;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(TargetError::Busy),
            Err(TrySendError::Disconnected(_)) => Err(TargetError::Disconnected),
        }
    }

    fn poll_ack(&mut self) -> bool {
        while self.stale_acks > 0 {
            match self.ack_rx.try_recv() {
                Ok(ack) => {
                    self.stale_acks -= 1;
                    debug!("[ChannelTarget] discarded stale ack for {:#x}", ack.addr);
                }
                Err(_) => return false,
            }
        }
        match self.ack_rx.try_recv() {
            Ok(ack) => {
                self.outstanding = false;
                debug!("[ChannelTarget] ack for {:#x}", ack.addr);
                true
            }
            Err(TryRecvError::Empty) => false,
            // No endpoint left to answer: the request stays outstanding.
            Err(TryRecvError::Disconnected) => false,
        }
    }

    fn abandon(&mut self) {
        if !self.outstanding {
            return;
        }
        self.outstanding = false;
        // Already answered: consume it now. Otherwise skip it when it lands.
        if self.ack_rx.try_recv().is_err() {
            self.stale_acks += 1;
        }
    }
}

impl RemoteEndpoint {
    /// Wait up to `timeout` for the next request.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ReportRequest>, TargetError> {
        match self.req_rx.recv_timeout(timeout) {
            Ok(req) => Ok(Some(req)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TargetError::Disconnected),
        }
    }

    pub fn ack(&self, req: &ReportRequest) -> Result<(), TargetError> {
        self.ack_tx
            .send(ReportAck { addr: req.addr })
            .map_err(|_| TargetError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(addr: u32) -> ReportRequest {
        ReportRequest {
            port: 1,
            remote_epid: 2,
            remote_port: 3,
            addr,
            data: 0,
        }
    }

    #[test]
    fn memory_target_acks_after_latency() {
        let mut t = MemoryTarget::with_latency(2);
        t.issue(req(0)).unwrap();
        assert_eq!(t.issue(req(8)), Err(TargetError::Busy));
        assert!(!t.poll_ack());
        assert!(!t.poll_ack());
        assert!(t.poll_ack());
        assert!(!t.is_outstanding());
        assert_eq!(t.acked(), 1);
        assert_eq!(t.issued(), &[req(0)]);
    }

    #[test]
    fn never_ack_target_stays_outstanding() {
        let mut t = MemoryTarget::never_ack();
        t.issue(req(0)).unwrap();
        for _ in 0..100 {
            assert!(!t.poll_ack());
        }
        assert!(t.is_outstanding());
    }

    #[test]
    fn channel_target_round_trip() {
        let (mut t, remote) = ChannelTarget::pair();
        t.issue(req(0x40)).unwrap();
        assert_eq!(t.issue(req(0x48)), Err(TargetError::Busy));
        assert!(!t.poll_ack());

        let got = remote
            .recv_timeout(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        assert_eq!(got, req(0x40));
        remote.ack(&got).unwrap();
        assert!(t.poll_ack());
        assert!(t.issue(req(0x48)).is_ok());
    }

    #[test]
    fn abandoned_memory_request_is_never_acked() {
        let mut t = MemoryTarget::with_latency(1);
        t.issue(req(0)).unwrap();
        t.abandon();
        assert!(!t.is_outstanding());
        assert!(!t.poll_ack());
        t.issue(req(8)).unwrap();
        assert!(!t.poll_ack());
        assert!(t.poll_ack());
        assert_eq!(t.acked(), 1);
    }

    #[test]
    fn channel_target_skips_ack_of_abandoned_request() {
        let (mut t, remote) = ChannelTarget::pair();
        t.issue(req(0x40)).unwrap();
        let old = remote
            .recv_timeout(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        t.abandon();

        // The remote answers the old request after the abandon.
        remote.ack(&old).unwrap();
        t.issue(req(0x48)).unwrap();
        assert!(!t.poll_ack());

        let new = remote
            .recv_timeout(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        assert_eq!(new, req(0x48));
        remote.ack(&new).unwrap();
        assert!(t.poll_ack());
        assert!(!t.poll_ack());
    }

    #[test]
    fn channel_target_consumes_ack_already_waiting_on_abandon() {
        let (mut t, remote) = ChannelTarget::pair();
        t.issue(req(0x40)).unwrap();
        let old = remote
            .recv_timeout(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        remote.ack(&old).unwrap();
        t.abandon();
        assert!(!t.poll_ack());
        t.issue(req(0x48)).unwrap();
        assert!(!t.poll_ack());
    }

    #[test]
    fn channel_target_reports_disconnect() {
        let (mut t, remote) = ChannelTarget::pair();
        drop(remote);
        assert_eq!(t.issue(req(0)), Err(TargetError::Disconnected));
        assert!(!t.poll_ack());
    }
}
