//! assembler.rs
//! Target-side reconstruction of error events from the three-write report sequence.

use log::warn;

use crate::reporting::error_queue::{ErrorCode, ErrorEvent};
use crate::reporting::target::{
    ReportRequest, REPORT_CODE_OFFSET, REPORT_TIME_HI_OFFSET, REPORT_TIME_LO_OFFSET,
};

/// Collects code / time-low / time-high writes landing at `base_address`.
#[derive(Debug, Default)]
pub struct ReportAssembler {
    base_address: u32,
    code: Option<u32>,
    time_lo: Option<u32>,
    malformed: u64,
}

impl ReportAssembler {
    pub fn new(base_address: u32) -> Self {
        Self {
            base_address,
            ..Self::default()
        }
    }

    /// Sequences that were abandoned or carried an unknown code.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Feed one write. Returns the event once its high timestamp word lands.
    pub fn write(&mut self, req: &ReportRequest) -> Option<ErrorEvent> {
        match req.addr.wrapping_sub(self.base_address) {
            REPORT_CODE_OFFSET => {
                if self.code.is_some() {
                    self.discard("code written twice");
                }
                self.code = Some(req.data);
                None
            }
            REPORT_TIME_LO_OFFSET if self.code.is_some() && self.time_lo.is_none() => {
                self.time_lo = Some(req.data);
                None
            }
            REPORT_TIME_HI_OFFSET => {
                let (Some(code), Some(lo)) = (self.code.take(), self.time_lo.take()) else {
                    self.discard("time high without code/time low");
                    return None;
                };
                let timestamp = ((req.data as u64) << 32) | lo as u64;
                match ErrorCode::from_code(code) {
                    Some(code) => Some(ErrorEvent::new(code, timestamp)),
                    None => {
                        self.malformed += 1;
                        warn!("[ReportAssembler] unknown error code {}", code);
                        None
                    }
                }
            }
            _ => {
                self.discard("unexpected address");
                None
            }
        }
    }

    fn discard(&mut self, why: &str) {
        self.malformed += 1;
        self.code = None;
        self.time_lo = None;
        warn!("[ReportAssembler] dropping partial report: {}", why);
    }
}
