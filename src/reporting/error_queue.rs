//! error_queue.rs
//! Bounded fault queue between admission (single writer) and reporting (single reader).
//!
//! - Non-blocking push: a full queue rejects the event, which is lost and counted
//! - No capacity growth; FIFO among accepted events
//! - Push is gated on readiness sampled in the same tick (mask-with-ready)

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;
use log::debug;
use serde::{Deserialize, Serialize};

/// Default depth of the fault queue.
pub const ERROR_QUEUE_DEPTH: usize = 32;

/// Fault classes reported to the remote target. Discriminants are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Consumer pulled while no input word was available.
    Underrun = 1,
    /// Deadline already passed when the packet was examined.
    LateData = 2,
}

impl ErrorCode {
    #[inline]
    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(ErrorCode::Underrun),
            2 => Some(ErrorCode::LateData),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::Underrun => "underrun",
            ErrorCode::LateData => "late_data",
        }
    }
}

/// One fault, stamped with the clock value of the tick that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub code: ErrorCode,
    pub timestamp: u64,
}

impl ErrorEvent {
    pub fn new(code: ErrorCode, timestamp: u64) -> Self {
        Self { code, timestamp }
    }
}

pub struct ErrorQueue {
    queue: ArrayQueue<ErrorEvent>,
    dropped: AtomicU64, // events rejected because the queue was full
}

impl ErrorQueue {
    pub fn new() -> Self {
        Self::with_capacity(ERROR_QUEUE_DEPTH)
    }

    /// # Panics
    /// If `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            dropped: AtomicU64::new(0),
        }
    }

    /// Space available this tick.
    #[inline]
    pub fn is_ready(&self) -> bool {
        !self.queue.is_full()
    }

    /// Enqueue without blocking. Returns false (and drops the event) when full.
    pub fn try_enqueue(&self, event: ErrorEvent) -> bool {
        // Readiness first: a rejected write must leave the queue untouched.
        if !self.is_ready() || self.queue.push(event).is_err() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(
                "[ErrorQueue] full, dropped {:?} (total dropped={})",
                event, total
            );
            return false;
        }
        true
    }

    #[inline]
    pub fn try_dequeue(&self) -> Option<ErrorEvent> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Discard pending events and zero the drop counter.
    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
        self.dropped.store(0, Ordering::Relaxed);
    }
}

impl Default for ErrorQueue {
    fn default() -> Self {
        Self::new()
    }
}
