/// Test harness driving a `TxCore` one tick at a time against an in-memory report target.
use tx_admission::{
    admission::stream::{BeatQueue, TxPacket},
    config::registers::{ConfigRegister, CtrlRequest, ErrorPolicy},
    engine::{TickResult, TxCore},
    reporting::{assembler::ReportAssembler, error_queue::ErrorEvent, target::MemoryTarget},
};

#[allow(dead_code)]
pub const IDLE: u32 = 0x0BAD_F00D;
#[allow(dead_code)]
pub const BASE: u32 = 0x0100;
#[allow(dead_code)]
pub const START: u64 = 100;

#[allow(dead_code)]
pub struct Harness {
    pub core: TxCore<MemoryTarget, 1>,
    pub input: BeatQueue<1>,
    pub now: u64,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self::with_target(policy, MemoryTarget::with_latency(0), 32)
    }

    pub fn with_target(policy: ErrorPolicy, target: MemoryTarget, depth: usize) -> Self {
        let mut h = Self {
            core: TxCore::with_queue_depth(target, depth),
            input: BeatQueue::new(),
            now: START,
        };
        h.configure(policy);
        h
    }

    /// Program idle value, policy and report destination through the control port.
    pub fn configure(&mut self, policy: ErrorPolicy) {
        for (reg, data) in [
            (ConfigRegister::IdleValue, IDLE),
            (ConfigRegister::ErrorPolicy, policy.bits()),
            (ConfigRegister::ErrPort, 3),
            (ConfigRegister::ErrRemoteEpid, 0x44),
            (ConfigRegister::ErrRemotePort, 9),
            (ConfigRegister::ErrBaseAddress, BASE),
        ] {
            assert!(self.core.handle_ctrl(CtrlRequest::Write { reg, data }).is_some());
        }
    }

    pub fn push(&mut self, pkt: TxPacket<1>) {
        self.input.push_packet(&pkt);
    }

    pub fn step(&mut self, pull: bool) -> TickResult<1> {
        let res = self.core.tick(self.now, pull, &mut self.input);
        self.now += 1;
        res
    }

    /// Run `n` ticks with the consumer pulling every tick.
    pub fn run(&mut self, n: usize) -> Vec<TickResult<1>> {
        (0..n).map(|_| self.step(true)).collect()
    }

    /// Events fully written to the target so far.
    pub fn reported(&self) -> Vec<ErrorEvent> {
        let mut asm = ReportAssembler::new(BASE);
        self.core
            .target()
            .issued()
            .iter()
            .filter_map(|req| asm.write(req))
            .collect()
    }
}

/// Samples actually handed to the consumer (transmitting and accepted).
#[allow(dead_code)]
pub fn sent(results: &[TickResult<1>]) -> Vec<u32> {
    results
        .iter()
        .filter(|r| r.output.transmitting && r.output.accepted)
        .map(|r| r.output.samples[0])
        .collect()
}

#[allow(dead_code)]
pub fn packet(words: &[u32]) -> TxPacket<1> {
    TxPacket::new(words.iter().map(|&w| [w]).collect())
}
