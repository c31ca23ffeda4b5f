//! error.rs
//! Error types for the fallible edges of the engine.
//! The per-tick path never returns errors: drops and stalls are counted instead.

use thiserror::Error;

/// Control-port decoding failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// No configuration register lives at this address.
    #[error("unknown control register address {0:#06x}")]
    UnknownAddress(u32),
    /// Register exists but cannot be written.
    #[error("register at {0:#06x} is read-only")]
    ReadOnly(u32),
    /// Request was accepted but no acknowledgment came back.
    #[error("control request to {0:#06x} was not acknowledged")]
    NoAck(u32),
}

/// Failures while handing a report write to the remote target.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("report target disconnected")]
    Disconnected,
    #[error("report target busy: a request is already outstanding")]
    Busy,
}

/// Export failures in the runner and analysis tools.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
