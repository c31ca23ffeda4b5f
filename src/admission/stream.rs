//! stream.rs
//! Input side of the admission controller: words, packets and the valid/ready handshake.
//!
//! A packet is a run of beats ending at `last`. The first beat carries the
//! sideband (`has_time`, `timestamp`, `eob`); it is only sampled at packet boundaries.

use std::collections::VecDeque;

/// One sample on the wire.
pub type Sample = u32;

/// One beat of the input stream: `SPC` samples plus packet sideband.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputBeat<const SPC: usize> {
    pub samples: [Sample; SPC],
    pub last: bool,
    pub has_time: bool,
    /// Absolute release time; meaningful only when `has_time` is set.
    pub timestamp: u64,
    pub eob: bool,
}

impl<const SPC: usize> InputBeat<SPC> {
    pub fn new(samples: [Sample; SPC]) -> Self {
        Self {
            samples,
            last: false,
            has_time: false,
            timestamp: 0,
            eob: false,
        }
    }

    /// Deadline carried by this beat, if any.
    #[inline]
    pub fn deadline(&self) -> Option<u64> {
        self.has_time.then_some(self.timestamp)
    }
}

/// Producer side of the handshake.
///
/// `peek` returning `Some` is "valid asserted". `accept` completes the transfer
/// and is only called in a tick where the controller is ready.
pub trait InputStream<const SPC: usize> {
    fn peek(&self) -> Option<&InputBeat<SPC>>;
    fn accept(&mut self);
}

/// Packet as the producer sees it, before it is split into beats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPacket<const SPC: usize> {
    pub words: Vec<[Sample; SPC]>,
    pub deadline: Option<u64>,
    pub eob: bool,
}

impl<const SPC: usize> TxPacket<SPC> {
    pub fn new(words: Vec<[Sample; SPC]>) -> Self {
        Self {
            words,
            deadline: None,
            eob: false,
        }
    }

    pub fn with_deadline(mut self, time: u64) -> Self {
        self.deadline = Some(time);
        self
    }

    pub fn end_of_burst(mut self) -> Self {
        self.eob = true;
        self
    }

    /// Split into beats. An empty packet goes out as a single zero word.
    pub fn beats(&self) -> Vec<InputBeat<SPC>> {
        let words: Vec<[Sample; SPC]> = if self.words.is_empty() {
            vec![[0; SPC]]
        } else {
            self.words.clone()
        };
        let n = words.len();
        words
            .into_iter()
            .enumerate()
            .map(|(i, samples)| InputBeat {
                samples,
                last: i + 1 == n,
                has_time: self.deadline.is_some(),
                timestamp: self.deadline.unwrap_or(0),
                eob: self.eob,
            })
            .collect()
    }
}

/// FIFO-backed producer. Valid whenever it holds at least one beat.
#[derive(Debug, Default)]
pub struct BeatQueue<const SPC: usize> {
    beats: VecDeque<InputBeat<SPC>>,
    accepted: u64,
}

impl<const SPC: usize> BeatQueue<SPC> {
    pub fn new() -> Self {
        Self {
            beats: VecDeque::new(),
            accepted: 0,
        }
    }

    pub fn push_packet(&mut self, packet: &TxPacket<SPC>) {
        self.beats.extend(packet.beats());
    }

    pub fn push_beat(&mut self, beat: InputBeat<SPC>) {
        self.beats.push_back(beat);
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Beats consumed through the handshake so far.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }
}

impl<const SPC: usize> InputStream<SPC> for BeatQueue<SPC> {
    fn peek(&self) -> Option<&InputBeat<SPC>> {
        self.beats.front()
    }

    fn accept(&mut self) {
        if self.beats.pop_front().is_some() {
            self.accepted += 1;
        }
    }
}
