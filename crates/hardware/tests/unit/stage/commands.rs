//! # Command State Machine Tests
//!
//! Drives the stage with commands from the command processor and checks the
//! state transitions, the register file and the protocol errors.

use mockall::predicate::eq;
use pretty_assertions::assert_eq;
use rstest::rstest;
use zstsim_core::cache::ClearStatus;
use zstsim_core::common::ZStencilError;
use zstsim_core::config::ZStencilConfig;
use zstsim_core::rop::{
    CompareMode, Destination, GpuRegister, RasterizerCommand, RasterizerState, RegisterValue,
};

use crate::common::harness::StageHarness;
use crate::common::mocks::cache::{MockCache, always_hit, housekeeping};

fn harness() -> StageHarness {
    StageHarness::new(&ZStencilConfig::default(), Box::new(always_hit(0)))
}

/// Runs cycles until the stage fails, at most `limit` cycles.
fn step_until_error(h: &mut StageHarness, limit: u64) -> ZStencilError {
    for _ in 0..limit {
        if let Err(e) = h.step() {
            return e;
        }
    }
    panic!("stage accepted the command");
}

/// Brings the stage into `End` through a clear.
fn into_end(h: &mut StageHarness) {
    h.ready();
    h.command(RasterizerCommand::Clear);
    h.step_until(RasterizerState::End, 4);
}

// ══════════════════════════════════════════════════════════
// Transitions
// ══════════════════════════════════════════════════════════

#[test]
fn test_reset_state_becomes_ready() {
    let mut h = harness();
    assert_eq!(h.unit.state(), RasterizerState::Reset);
    h.step().unwrap();
    assert_eq!(h.unit.state(), RasterizerState::Ready);
}

/// A reset command restores the power-on registers.
#[test]
fn test_reset_command_restores_registers() {
    let mut h = harness();
    h.ready();
    h.register(GpuRegister::EarlyZ, RegisterValue::Bool(false));
    h.step().unwrap();
    h.step().unwrap();
    assert!(!h.unit.registers().early_z);

    h.command(RasterizerCommand::Reset);
    h.step().unwrap();
    h.step().unwrap();
    assert_eq!(h.unit.state(), RasterizerState::Reset);
    h.step().unwrap();
    assert_eq!(h.unit.state(), RasterizerState::Ready);
    assert!(h.unit.registers().early_z);
}

#[test]
fn test_draw_enters_drawing() {
    let mut h = harness();
    h.start_draw(&[]);
    assert_eq!(h.unit.state(), RasterizerState::Drawing);
    assert_eq!(h.unit.destination(), Destination::FragmentFifo);
}

#[test]
fn test_clear_reaches_end_and_end_returns_to_ready() {
    let mut h = harness();
    into_end(&mut h);

    h.command(RasterizerCommand::End);
    h.step_until(RasterizerState::Ready, 3);
}

/// A cache that clears at once is asked to clear only once.
#[test]
fn test_immediate_clear_goes_straight_to_end() {
    let mut cache = MockCache::new();
    cache.expect_swap().return_const(());
    cache.expect_reset().return_const(());
    cache.expect_update().returning(|_, _| None);
    cache.expect_update_hz().returning(|| None);
    cache.expect_has_pending_requests().return_const(false);
    cache.expect_clear().times(1).return_const(ClearStatus::Done);

    let mut h = StageHarness::new(&ZStencilConfig::default(), Box::new(cache));
    h.ready();
    h.command(RasterizerCommand::Clear);
    h.step().unwrap();
    h.step().unwrap();
    assert_eq!(h.unit.state(), RasterizerState::End);
    for _ in 0..3 {
        h.step().unwrap();
        assert_eq!(h.unit.state(), RasterizerState::End);
    }
}

#[test]
fn test_swap_counts_frames() {
    let mut h = harness();
    h.ready();
    h.command(RasterizerCommand::Swap);
    h.step_until(RasterizerState::End, 4);
    assert_eq!(h.unit.frames(), 1);

    h.command(RasterizerCommand::End);
    h.step_until(RasterizerState::Ready, 3);
    h.command(RasterizerCommand::Swap);
    h.step_until(RasterizerState::End, 4);
    assert_eq!(h.unit.frames(), 2);
}

/// The swap state waits until the cache has written every dirty line back.
#[test]
fn test_swap_waits_for_flush() {
    let mut cache = MockCache::new();
    cache.expect_swap().return_const(());
    cache.expect_reset().return_const(());
    cache.expect_update().returning(|_, _| None);
    cache.expect_update_hz().returning(|| None);
    cache.expect_has_pending_requests().return_const(false);
    let mut flushes = 0;
    cache.expect_flush().returning(move || {
        flushes += 1;
        flushes > 3
    });

    let mut h = StageHarness::new(&ZStencilConfig::default(), Box::new(cache));
    h.ready();
    h.command(RasterizerCommand::Swap);
    h.step().unwrap();
    h.step().unwrap();
    assert_eq!(h.unit.state(), RasterizerState::Swap);
    for _ in 0..3 {
        h.step().unwrap();
        assert_eq!(h.unit.state(), RasterizerState::Swap);
    }
    h.step().unwrap();
    assert_eq!(h.unit.state(), RasterizerState::End);
}

// ══════════════════════════════════════════════════════════
// Registers
// ══════════════════════════════════════════════════════════

#[test]
fn test_register_writes_update_the_register_file() {
    let mut h = harness();
    h.start_draw(&[
        (GpuRegister::DepthTest, RegisterValue::Bool(true)),
        (GpuRegister::DepthFunction, RegisterValue::Compare(CompareMode::GreaterEqual)),
        (GpuRegister::ZBufferClear, RegisterValue::Uint(0x1234)),
        (GpuRegister::EarlyZ, RegisterValue::Bool(false)),
    ]);
    let regs = h.unit.registers();
    assert!(regs.depth_test);
    assert_eq!(regs.depth_function, CompareMode::GreaterEqual);
    assert_eq!(regs.clear_depth, 0x1234);
    assert_eq!(h.unit.destination(), Destination::ColorWrite);
}

/// Moving the buffer reaches the cache right away.
#[test]
fn test_buffer_address_write_moves_the_cache() {
    let mut cache = MockCache::new();
    housekeeping(&mut cache);
    cache.expect_swap().with(eq(0x0060_0000)).times(1).return_const(());
    cache.expect_swap().with(eq(0x0010_0000)).times(1).return_const(());

    let mut h = StageHarness::new(&ZStencilConfig::default(), Box::new(cache));
    h.ready();
    h.register(GpuRegister::ZStencilBufferAddr, RegisterValue::Uint(0x0010_0000));
    h.step().unwrap();
    h.step().unwrap();
    assert_eq!(h.unit.registers().zstencil_buffer, 0x0010_0000);
}

/// A buffer base inside a stamp would split stamps across cache lines.
#[test]
fn test_unaligned_buffer_address_is_rejected() {
    let mut cache = MockCache::new();
    housekeeping(&mut cache);
    cache.expect_swap().with(eq(0x0060_0000)).times(1).return_const(());

    let mut h = StageHarness::new(&ZStencilConfig::default(), Box::new(cache));
    h.ready();
    h.register(GpuRegister::ZStencilBufferAddr, RegisterValue::Uint(0x0010_0002));
    match step_until_error(&mut h, 3) {
        ZStencilError::UnalignedBufferAddress { address, alignment } => {
            assert_eq!(address, 0x0010_0002);
            assert_eq!(alignment, 16);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(h.unit.registers().zstencil_buffer, 0x0060_0000);
}

#[test]
fn test_mistyped_register_value_is_rejected() {
    let mut h = harness();
    h.ready();
    h.register(GpuRegister::DepthTest, RegisterValue::Uint(1));
    match step_until_error(&mut h, 3) {
        ZStencilError::MistypedRegister { register, value } => {
            assert_eq!(register, GpuRegister::DepthTest);
            assert_eq!(value, RegisterValue::Uint(1));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!h.unit.registers().depth_test);
}

// ══════════════════════════════════════════════════════════
// Commands in the wrong state
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::draw(RasterizerCommand::Draw, "DRAW")]
#[case::swap(RasterizerCommand::Swap, "SWAP")]
#[case::clear(RasterizerCommand::Clear, "CLEAR")]
#[case::register_write(
    RasterizerCommand::RegisterWrite {
        register: GpuRegister::DepthTest,
        subreg: 0,
        value: RegisterValue::Bool(true),
    },
    "REG_WRITE"
)]
fn test_ready_only_commands_fail_in_end(#[case] command: RasterizerCommand, #[case] name: &str) {
    let mut h = harness();
    into_end(&mut h);

    h.command(command);
    match step_until_error(&mut h, 3) {
        ZStencilError::CommandInWrongState {
            command,
            required,
            current,
        } => {
            assert_eq!(command, name);
            assert_eq!(required, RasterizerState::Ready);
            assert_eq!(current, RasterizerState::End);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_end_fails_in_ready() {
    let mut h = harness();
    h.ready();
    h.command(RasterizerCommand::End);
    assert!(matches!(
        step_until_error(&mut h, 3),
        ZStencilError::CommandInWrongState {
            command: "END",
            required: RasterizerState::End,
            current: RasterizerState::Ready,
        }
    ));
}

/// Commands are not read while a batch is being drawn.
#[test]
fn test_commands_wait_while_drawing() {
    let mut h = harness();
    h.start_draw(&[]);
    h.command(RasterizerCommand::Swap);
    for _ in 0..4 {
        h.step().unwrap();
    }
    assert_eq!(h.unit.state(), RasterizerState::Drawing);
    assert_eq!(h.peers.command.in_flight(), 1);
}
