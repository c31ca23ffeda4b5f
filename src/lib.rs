//! # tx_admission
//!
//! Timed transmit admission and error reporting, modeled one clock tick at a time.
//!
//! - **Admission:** holds each packet at the input boundary until its optional
//!   deadline resolves, then streams it to a fixed-rate consumer.
//! - **Error queue:** bounded, drop-on-full hand-off of late-data and underrun faults.
//! - **Reporting:** delivers each fault as three acknowledged register writes.
//! - **Configuration:** idle value, error policy and report destination behind a control port.

pub mod admission;
pub mod config;
pub mod engine;
pub mod error;
pub mod reporting;
pub mod sim;
pub mod utils;

pub use admission::controller::{AdmissionController, TxOutput, TxState};
pub use admission::stream::{BeatQueue, InputBeat, InputStream, Sample, TxPacket};
pub use config::registers::{ConfigRegister, Configuration, CtrlRequest, CtrlResponse, ErrorPolicy, ErrorTarget};
pub use engine::{EngineStats, TickResult, TxCore};
pub use reporting::error_queue::{ErrorCode, ErrorEvent, ErrorQueue};
pub use reporting::target::{ChannelTarget, MemoryTarget, ReportRequest, ReportTarget};
