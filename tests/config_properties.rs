//! Control port: register round trips, policy coercion, status registers.
mod helpers;

use helpers::{packet, Harness, IDLE};
use tx_admission::{
    config::registers::{
        ErrorPolicy, REG_ERROR_POLICY, REG_ERR_ADDR, REG_ERR_DROPPED, REG_ERR_PORT,
        REG_ERR_REM_EPID, REG_ERR_REM_PORT, REG_IDLE_VALUE, REG_TX_STATUS,
    },
    engine::TxCore,
    reporting::target::MemoryTarget,
};

fn core() -> TxCore<MemoryTarget, 1> {
    TxCore::new(MemoryTarget::default())
}

fn read(core: &mut TxCore<MemoryTarget, 1>, addr: u32) -> Option<u32> {
    core.handle_addressed(addr, false, 0).map(|r| r.data)
}

#[test]
fn writable_registers_read_back() {
    let mut core = core();
    for (addr, value) in [
        (REG_IDLE_VALUE, 0xDEAD_BEEF),
        (REG_ERR_PORT, 7),
        (REG_ERR_REM_EPID, 0x1234),
        (REG_ERR_REM_PORT, 2),
        (REG_ERR_ADDR, 0x8000_0000),
    ] {
        let ack = core.handle_addressed(addr, true, value).map(|r| r.data);
        assert_eq!(ack, Some(value), "write ack for {:#x}", addr);
        assert_eq!(read(&mut core, addr), Some(value), "read back {:#x}", addr);
    }
    assert_eq!(core.configuration().generation, 5);
}

#[test]
fn port_fields_keep_low_sixteen_bits() {
    let mut core = core();
    assert_eq!(core.handle_addressed(REG_ERR_PORT, true, 0x0001_0005).map(|r| r.data), Some(5));
    assert_eq!(core.configuration().error_target.port, 5);
}

#[test]
fn unrecognised_policy_falls_back_to_per_packet() {
    let mut core = core();
    core.handle_addressed(REG_ERROR_POLICY, true, ErrorPolicy::PER_BURST_BITS);
    assert_eq!(read(&mut core, REG_ERROR_POLICY), Some(ErrorPolicy::PER_BURST_BITS));

    for bits in [0, 3, 0xFF] {
        let ack = core.handle_addressed(REG_ERROR_POLICY, true, bits).map(|r| r.data);
        assert_eq!(ack, Some(ErrorPolicy::PER_PACKET_BITS));
        assert_eq!(core.configuration().error_policy, ErrorPolicy::PerPacket);
    }
}

#[test]
fn unknown_addresses_are_not_acknowledged() {
    let mut core = core();
    assert_eq!(read(&mut core, 0x00), None);
    assert_eq!(read(&mut core, 0x41), None);
    assert_eq!(core.handle_addressed(0x60, true, 1), None);
    assert_eq!(core.configuration().generation, 0);
}

#[test]
fn status_registers_are_read_only() {
    let mut core = core();
    assert_eq!(core.handle_addressed(REG_TX_STATUS, true, 1), None);
    assert_eq!(core.handle_addressed(REG_ERR_DROPPED, true, 1), None);
    assert_eq!(read(&mut core, REG_TX_STATUS), Some(0));
    assert_eq!(read(&mut core, REG_ERR_DROPPED), Some(0));
}

#[test]
fn dropped_counter_is_visible_on_the_control_port() {
    let mut h = Harness::with_target(ErrorPolicy::PerPacket, MemoryTarget::never_ack(), 1);
    for _ in 0..4 {
        h.push(packet(&[0]).with_deadline(1).end_of_burst());
    }
    h.run(12);
    // One in flight, one queued, two lost.
    assert_eq!(read(&mut h.core, REG_ERR_DROPPED), Some(2));
}

#[test]
fn idle_value_change_applies_on_next_tick() {
    let mut h = Harness::new(ErrorPolicy::PerPacket);
    assert_eq!(h.step(true).output.samples, [IDLE]);
    h.core.handle_addressed(REG_IDLE_VALUE, true, 0x5A5A);
    assert_eq!(h.step(true).output.samples, [0x5A5A]);
}

#[test]
fn policy_change_mid_drain_is_honoured_at_the_next_boundary() {
    let mut h = Harness::new(ErrorPolicy::PerBurst);
    // Late packet, not the end of its burst.
    h.push(packet(&[1, 2]).with_deadline(0));
    h.push(packet(&[3]).end_of_burst());
    h.run(3); // check, late, discard 1
    h.core.handle_addressed(REG_ERROR_POLICY, true, ErrorPolicy::PER_PACKET_BITS);
    h.step(true); // discard 2: packet boundary, now enough to resynchronise
    assert_eq!(h.core.state(), tx_admission::TxState::Idle);
    assert_eq!(h.core.stats().beats_discarded, 2);
}
