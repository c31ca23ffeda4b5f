//! stimulus.rs
//! Random burst traffic for the simulation runner.
//! - bursts of 1..=N packets, only the last flagged end-of-burst
//! - first packet optionally timed; a share of those deadlines are already in the past
//! - random producer gaps mid-burst starve the consumer (underruns)

use std::collections::VecDeque;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::admission::stream::{BeatQueue, Sample, TxPacket};

#[derive(Debug, Clone)]
pub struct TrafficProfile {
    /// Probability that a burst's deadline is already late when queued.
    pub late_ratio: f64,
    /// Probability of a producer gap after each packet.
    pub gap_ratio: f64,
    /// Probability that a burst carries a deadline at all.
    pub timed_ratio: f64,
    pub max_packets_per_burst: usize,
    pub max_words_per_packet: usize,
    /// Upper bound on how far ahead a timed burst is scheduled.
    pub max_lead: u64,
    pub max_gap: u64,
    /// The producer tops up the input only below this many beats.
    pub low_water: usize,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self {
            late_ratio: 0.05,
            gap_ratio: 0.02,
            timed_ratio: 0.5,
            max_packets_per_burst: 4,
            max_words_per_packet: 32,
            max_lead: 64,
            max_gap: 48,
            low_water: 16,
        }
    }
}

pub struct TrafficGenerator<const SPC: usize> {
    rng: StdRng,
    profile: TrafficProfile,
    pending: VecDeque<TxPacket<SPC>>,
    hold_until: u64,
    bursts: u64,
    packets: u64,
}

impl<const SPC: usize> TrafficGenerator<SPC> {
    pub fn new(profile: TrafficProfile, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            profile,
            pending: VecDeque::new(),
            hold_until: 0,
            bursts: 0,
            packets: 0,
        }
    }

    pub fn bursts(&self) -> u64 {
        self.bursts
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Offer at most one packet to the input this tick.
    pub fn fill(&mut self, now: u64, input: &mut BeatQueue<SPC>) {
        if now < self.hold_until || input.len() >= self.profile.low_water {
            return;
        }
        if self.pending.is_empty() {
            let burst = self.next_burst(now, input.len() as u64);
            self.pending.extend(burst);
            self.bursts += 1;
        }
        if let Some(pkt) = self.pending.pop_front() {
            input.push_packet(&pkt);
            self.packets += 1;
        }
        if self.profile.max_gap > 0 && self.rng.random_bool(self.profile.gap_ratio) {
            self.hold_until = now + self.rng.random_range(1..=self.profile.max_gap);
        }
    }

    fn next_burst(&mut self, now: u64, backlog: u64) -> Vec<TxPacket<SPC>> {
        let n = self.rng.random_range(1..=self.profile.max_packets_per_burst.max(1));
        let deadline = if self.rng.random_bool(self.profile.timed_ratio) {
            if self.rng.random_bool(self.profile.late_ratio) {
                Some(now.saturating_sub(self.rng.random_range(1..=16)))
            } else {
                // Past whatever is already queued ahead of it.
                Some(now + backlog + self.rng.random_range(2..=self.profile.max_lead.max(2)))
            }
        } else {
            None
        };

        (0..n)
            .map(|i| {
                let words = self.rng.random_range(1..=self.profile.max_words_per_packet.max(1));
                let mut pkt = TxPacket::new((0..words).map(|_| self.word()).collect());
                if i == 0 {
                    pkt.deadline = deadline;
                }
                if i + 1 == n {
                    pkt = pkt.end_of_burst();
                }
                pkt
            })
            .collect()
    }

    fn word(&mut self) -> [Sample; SPC] {
        std::array::from_fn(|_| self.rng.random())
    }
}
