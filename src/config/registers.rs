//! registers.rs
//! Control-port register map and the versioned configuration behind it.
//!
//! - Writes are the only way to mutate configuration; every applied write bumps `generation`
//! - Recognized reads/writes acknowledge in the same tick they are processed
//! - Unknown addresses decode to `RegisterError` and are never acknowledged
//! - Error policy accepts two encodings; anything else coerces to `PerPacket`

use log::debug;

use crate::admission::stream::Sample;
use crate::error::RegisterError;

// ============================================================================
// Register map (byte addresses on the control port)
// ============================================================================
pub const REG_IDLE_VALUE: u32 = 0x40;
pub const REG_ERROR_POLICY: u32 = 0x44;
pub const REG_ERR_PORT: u32 = 0x48;
pub const REG_ERR_REM_EPID: u32 = 0x4C;
pub const REG_ERR_REM_PORT: u32 = 0x50;
pub const REG_ERR_ADDR: u32 = 0x54;
// Read-only status, answered by the engine rather than the store.
pub const REG_TX_STATUS: u32 = 0x58;
pub const REG_ERR_DROPPED: u32 = 0x5C;

/// Where the Drain state is allowed to resynchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Leave Drain at the next packet boundary.
    #[default]
    PerPacket,
    /// Leave Drain only at a packet boundary that also ends a burst.
    PerBurst,
}

impl ErrorPolicy {
    pub const PER_PACKET_BITS: u32 = 0b01;
    pub const PER_BURST_BITS: u32 = 0b10;

    /// Decode a register value. Invalid encodings silently become `PerPacket`.
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            Self::PER_BURST_BITS => ErrorPolicy::PerBurst,
            _ => ErrorPolicy::PerPacket,
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            ErrorPolicy::PerPacket => Self::PER_PACKET_BITS,
            ErrorPolicy::PerBurst => Self::PER_BURST_BITS,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorPolicy::PerPacket => "per_packet",
            ErrorPolicy::PerBurst => "per_burst",
        }
    }
}

/// Destination of outbound error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorTarget {
    pub port: u16,
    pub remote_epid: u16,
    pub remote_port: u16,
    pub base_address: u32,
}

/// Snapshot of every writable field plus a generation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Configuration {
    pub idle_value: Sample,
    pub error_policy: ErrorPolicy,
    pub error_target: ErrorTarget,
    /// Number of writes applied since the last reset.
    pub generation: u64,
}

/// Typed view of the register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigRegister {
    IdleValue,
    ErrorPolicy,
    ErrPort,
    ErrRemoteEpid,
    ErrRemotePort,
    ErrBaseAddress,
    TxStatus,
    DroppedEvents,
}

impl ConfigRegister {
    pub fn from_addr(addr: u32) -> Result<Self, RegisterError> {
        match addr {
            REG_IDLE_VALUE => Ok(ConfigRegister::IdleValue),
            REG_ERROR_POLICY => Ok(ConfigRegister::ErrorPolicy),
            REG_ERR_PORT => Ok(ConfigRegister::ErrPort),
            REG_ERR_REM_EPID => Ok(ConfigRegister::ErrRemoteEpid),
            REG_ERR_REM_PORT => Ok(ConfigRegister::ErrRemotePort),
            REG_ERR_ADDR => Ok(ConfigRegister::ErrBaseAddress),
            REG_TX_STATUS => Ok(ConfigRegister::TxStatus),
            REG_ERR_DROPPED => Ok(ConfigRegister::DroppedEvents),
            other => Err(RegisterError::UnknownAddress(other)),
        }
    }

    pub fn addr(&self) -> u32 {
        match self {
            ConfigRegister::IdleValue => REG_IDLE_VALUE,
            ConfigRegister::ErrorPolicy => REG_ERROR_POLICY,
            ConfigRegister::ErrPort => REG_ERR_PORT,
            ConfigRegister::ErrRemoteEpid => REG_ERR_REM_EPID,
            ConfigRegister::ErrRemotePort => REG_ERR_REM_PORT,
            ConfigRegister::ErrBaseAddress => REG_ERR_ADDR,
            ConfigRegister::TxStatus => REG_TX_STATUS,
            ConfigRegister::DroppedEvents => REG_ERR_DROPPED,
        }
    }

    #[inline]
    pub fn is_status(&self) -> bool {
        matches!(self, ConfigRegister::TxStatus | ConfigRegister::DroppedEvents)
    }
}

/// Inbound control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlRequest {
    Write { reg: ConfigRegister, data: u32 },
    Read { reg: ConfigRegister },
}

impl CtrlRequest {
    /// Build a typed request from a raw control-port transaction.
    pub fn decode(addr: u32, is_write: bool, data: u32) -> Result<Self, RegisterError> {
        let reg = ConfigRegister::from_addr(addr)?;
        if is_write {
            if reg.is_status() {
                return Err(RegisterError::ReadOnly(addr));
            }
            Ok(CtrlRequest::Write { reg, data })
        } else {
            Ok(CtrlRequest::Read { reg })
        }
    }

    pub fn register(&self) -> ConfigRegister {
        match self {
            CtrlRequest::Write { reg, .. } | CtrlRequest::Read { reg } => *reg,
        }
    }
}

/// Acknowledgment. `data` is the value the register holds after the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtrlResponse {
    pub reg: ConfigRegister,
    pub data: u32,
}

/// Register file for the writable configuration.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: Configuration,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn snapshot(&self) -> &Configuration {
        &self.current
    }

    /// Restore power-on defaults: `PerPacket`, everything else zero.
    pub fn reset(&mut self) {
        self.current = Configuration::default();
    }

    /// Read a writable register. Status registers return `None`; the engine owns them.
    pub fn read(&self, reg: ConfigRegister) -> Option<u32> {
        let c = &self.current;
        let value = match reg {
            ConfigRegister::IdleValue => c.idle_value,
            ConfigRegister::ErrorPolicy => c.error_policy.bits(),
            ConfigRegister::ErrPort => c.error_target.port as u32,
            ConfigRegister::ErrRemoteEpid => c.error_target.remote_epid as u32,
            ConfigRegister::ErrRemotePort => c.error_target.remote_port as u32,
            ConfigRegister::ErrBaseAddress => c.error_target.base_address,
            ConfigRegister::TxStatus | ConfigRegister::DroppedEvents => return None,
        };
        Some(value)
    }

    /// Apply a write and return the stored value (after coercion/truncation).
    pub fn write(&mut self, reg: ConfigRegister, data: u32) -> Result<u32, RegisterError> {
        let c = &mut self.current;
        match reg {
            ConfigRegister::IdleValue => c.idle_value = data,
            ConfigRegister::ErrorPolicy => c.error_policy = ErrorPolicy::from_bits(data),
            ConfigRegister::ErrPort => c.error_target.port = data as u16,
            ConfigRegister::ErrRemoteEpid => c.error_target.remote_epid = data as u16,
            ConfigRegister::ErrRemotePort => c.error_target.remote_port = data as u16,
            ConfigRegister::ErrBaseAddress => c.error_target.base_address = data,
            ConfigRegister::TxStatus | ConfigRegister::DroppedEvents => {
                return Err(RegisterError::ReadOnly(reg.addr()));
            }
        }
        c.generation += 1;
        debug!(
            "[ConfigStore] {:?} <= {:#x} (generation {})",
            reg, data, c.generation
        );
        // Writable registers always read back.
        Ok(self.read(reg).unwrap_or_default())
    }

    /// Serve a typed request. Requests the store cannot answer get no acknowledgment.
    pub fn handle(&mut self, req: CtrlRequest) -> Option<CtrlResponse> {
        match req {
            CtrlRequest::Write { reg, data } => match self.write(reg, data) {
                Ok(stored) => Some(CtrlResponse { reg, data: stored }),
                Err(e) => {
                    debug!("[ConfigStore] write ignored: {}", e);
                    None
                }
            },
            CtrlRequest::Read { reg } => self.read(reg).map(|data| CtrlResponse { reg, data }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_per_packet_and_zero() {
        let store = ConfigStore::new();
        let c = store.snapshot();
        assert_eq!(c.error_policy, ErrorPolicy::PerPacket);
        assert_eq!(c.idle_value, 0);
        assert_eq!(c.error_target, ErrorTarget::default());
        assert_eq!(c.generation, 0);
    }

    #[test]
    fn invalid_policy_encodings_coerce_to_per_packet() {
        assert_eq!(ErrorPolicy::from_bits(0), ErrorPolicy::PerPacket);
        assert_eq!(ErrorPolicy::from_bits(1), ErrorPolicy::PerPacket);
        assert_eq!(ErrorPolicy::from_bits(2), ErrorPolicy::PerBurst);
        assert_eq!(ErrorPolicy::from_bits(3), ErrorPolicy::PerPacket);
        assert_eq!(ErrorPolicy::from_bits(0xFFFF_FFFF), ErrorPolicy::PerPacket);
    }

    #[test]
    fn write_bumps_generation_and_reset_clears_it() {
        let mut store = ConfigStore::new();
        store.write(ConfigRegister::ErrPort, 7).unwrap();
        store.write(ConfigRegister::ErrBaseAddress, 0x1000).unwrap();
        assert_eq!(store.snapshot().generation, 2);
        assert_eq!(store.snapshot().error_target.base_address, 0x1000);

        store.reset();
        assert_eq!(*store.snapshot(), Configuration::default());
    }

    #[test]
    fn port_fields_truncate_to_sixteen_bits() {
        let mut store = ConfigStore::new();
        let stored = store.write(ConfigRegister::ErrRemoteEpid, 0x1_2345).unwrap();
        assert_eq!(stored, 0x2345);
    }

    #[test]
    fn status_registers_are_read_only() {
        let mut store = ConfigStore::new();
        assert_eq!(
            store.write(ConfigRegister::TxStatus, 1),
            Err(RegisterError::ReadOnly(REG_TX_STATUS))
        );
        assert!(store.handle(CtrlRequest::Read { reg: ConfigRegister::DroppedEvents }).is_none());
        assert_eq!(store.snapshot().generation, 0);
    }

    #[test]
    fn decode_rejects_unknown_addresses() {
        assert_eq!(
            CtrlRequest::decode(0x1234, true, 5),
            Err(RegisterError::UnknownAddress(0x1234))
        );
        assert_eq!(
            CtrlRequest::decode(REG_ERR_DROPPED, true, 5),
            Err(RegisterError::ReadOnly(REG_ERR_DROPPED))
        );
        assert_eq!(
            CtrlRequest::decode(REG_IDLE_VALUE, false, 0),
            Ok(CtrlRequest::Read { reg: ConfigRegister::IdleValue })
        );
    }
}
