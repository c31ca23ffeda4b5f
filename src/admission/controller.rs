//! controller.rs
//! Admission controller: decides each tick whether the head packet may be released
//! to the fixed-rate consumer.
//!
//! - Idle: wait for a packet at the input boundary (nothing is consumed)
//! - CheckDeadline: one tick reserved to resolve the deadline comparison
//! - Active: one word per consumer pull; a pull with no word is an underrun
//! - Drain: discard input until the error policy allows resynchronisation
//!
//! Faults are pushed to the error queue without blocking; a full queue loses them.

use log::{debug, warn};

use crate::admission::stream::{InputBeat, InputStream, Sample};
use crate::config::registers::{Configuration, ErrorPolicy};
use crate::reporting::error_queue::{ErrorCode, ErrorEvent, ErrorQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    #[default]
    Idle,
    CheckDeadline,
    Active,
    Drain,
}

/// What the consumer sees for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutput<const SPC: usize> {
    /// Real data in Active, otherwise the idle value in every lane.
    pub samples: [Sample; SPC],
    /// True iff the controller was in Active this tick.
    pub transmitting: bool,
    /// An input beat was consumed this tick.
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionCounters {
    pub packets_started: u64,
    pub bursts_completed: u64,
    pub late: u64,
    pub underruns: u64,
    pub beats_sent: u64,
    pub beats_discarded: u64,
}

pub struct AdmissionController<const SPC: usize = 1> {
    state: TxState,
    // Next accepted beat opens a new packet.
    start_of_packet: bool,
    // Burst-end flag latched from the first beat of the current packet.
    burst_end: bool,
    counters: AdmissionCounters,
}

impl<const SPC: usize> AdmissionController<SPC> {
    pub fn new() -> Self {
        Self {
            state: TxState::Idle,
            start_of_packet: true,
            burst_end: false,
            counters: AdmissionCounters::default(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn state(&self) -> TxState {
        self.state
    }

    #[inline]
    pub fn is_transmitting(&self) -> bool {
        self.state == TxState::Active
    }

    #[inline]
    pub fn start_of_packet(&self) -> bool {
        self.start_of_packet
    }

    pub fn counters(&self) -> &AdmissionCounters {
        &self.counters
    }

    /// Advance one clock tick.
    ///
    /// Outputs are a function of the state at the start of the tick; the
    /// handshake and the state update take effect at its end.
    pub fn tick<I: InputStream<SPC>>(
        &mut self,
        now: u64,
        pull: bool,
        input: &mut I,
        config: &Configuration,
        errors: &ErrorQueue,
    ) -> TxOutput<SPC> {
        let beat = input.peek().copied();

        // ====================================================================
        // Outputs (combinational on current state)
        // ====================================================================
        let transmitting = self.state == TxState::Active;
        let samples = match (&beat, transmitting) {
            (Some(b), true) => b.samples,
            _ => [config.idle_value; SPC],
        };
        let ready = match self.state {
            TxState::Active => pull,
            TxState::Drain => true,
            TxState::Idle | TxState::CheckDeadline => false,
        };
        let accepted = ready && beat.is_some();

        // ====================================================================
        // Next state
        // ====================================================================
        let next = match self.state {
            TxState::Idle => {
                if beat.is_some() {
                    TxState::CheckDeadline
                } else {
                    TxState::Idle
                }
            }
            TxState::CheckDeadline => self.check_deadline(now, beat.as_ref(), errors),
            TxState::Active => self.transmit(now, pull, beat.as_ref(), errors),
            TxState::Drain => self.drain(beat.as_ref(), config.error_policy),
        };

        // ====================================================================
        // Handshake + packet boundary tracking
        // ====================================================================
        if let (true, Some(b)) = (accepted, beat) {
            if self.start_of_packet {
                self.burst_end = b.eob;
            }
            self.start_of_packet = b.last;
            input.accept();
            if transmitting {
                self.counters.beats_sent += 1;
            } else {
                self.counters.beats_discarded += 1;
            }
        }

        if next != self.state {
            debug!("[Admission] t={} {:?} -> {:?}", now, self.state, next);
            self.state = next;
        }

        TxOutput {
            samples,
            transmitting,
            accepted,
        }
    }

    /// Burst-end attribute of the packet `beat` belongs to.
    #[inline]
    fn packet_burst_end(&self, beat: &InputBeat<SPC>) -> bool {
        if self.start_of_packet {
            beat.eob
        } else {
            self.burst_end
        }
    }

    fn check_deadline(
        &mut self,
        now: u64,
        beat: Option<&InputBeat<SPC>>,
        errors: &ErrorQueue,
    ) -> TxState {
        // Producer withdrew valid: nothing to resolve, go back and wait.
        let Some(beat) = beat else {
            return TxState::Idle;
        };
        match beat.deadline() {
            None => self.start_packet(),
            Some(deadline) if deadline == now => self.start_packet(),
            Some(deadline) if now > deadline => {
                self.counters.late += 1;
                warn!(
                    "[Admission] late data: deadline={} now={} (late by {})",
                    deadline,
                    now,
                    now - deadline
                );
                self.raise(errors, ErrorEvent::new(ErrorCode::LateData, now));
                TxState::Drain
            }
            // Deadline still ahead: hold the packet at the boundary.
            Some(_) => TxState::CheckDeadline,
        }
    }

    fn start_packet(&mut self) -> TxState {
        self.counters.packets_started += 1;
        TxState::Active
    }

    fn transmit(
        &mut self,
        now: u64,
        pull: bool,
        beat: Option<&InputBeat<SPC>>,
        errors: &ErrorQueue,
    ) -> TxState {
        if !pull {
            return TxState::Active;
        }
        match beat {
            None => {
                self.counters.underruns += 1;
                warn!("[Admission] underrun at t={}", now);
                self.raise(errors, ErrorEvent::new(ErrorCode::Underrun, now));
                TxState::Drain
            }
            Some(b) if b.last && self.packet_burst_end(b) => {
                self.counters.bursts_completed += 1;
                TxState::Idle
            }
            Some(_) => TxState::Active,
        }
    }

    fn drain(&self, beat: Option<&InputBeat<SPC>>, policy: ErrorPolicy) -> TxState {
        // Burst-end flag of the boundary reached this tick, if any.
        let boundary = match beat {
            Some(b) if b.last => Some(self.packet_burst_end(b)),
            None if self.start_of_packet => Some(self.burst_end),
            _ => None,
        };
        match (boundary, policy) {
            (Some(_), ErrorPolicy::PerPacket) => TxState::Idle,
            (Some(true), ErrorPolicy::PerBurst) => TxState::Idle,
            _ => TxState::Drain,
        }
    }

    fn raise(&self, errors: &ErrorQueue, event: ErrorEvent) {
        if !errors.try_enqueue(event) {
            debug!("[Admission] error queue full, {:?} lost", event.code);
        }
    }
}

impl<const SPC: usize> Default for AdmissionController<SPC> {
    fn default() -> Self {
        Self::new()
    }
}
