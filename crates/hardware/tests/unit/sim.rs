//! # Simulator Tests
//!
//! Complete frames through the simulator driver: clear, batches, swap, and the
//! contents of video memory afterwards.

use pretty_assertions::assert_eq;
use zstsim_core::Simulator;
use zstsim_core::common::constants::{depth_of, stencil_of};
use zstsim_core::common::{ConfigError, SimError, TileLayout};
use zstsim_core::config::Config;
use zstsim_core::rop::{
    CompareMode, Destination, GpuRegister, RasterizerState, RegisterValue, StencilOp,
};
use zstsim_core::sim::workload::{self, Rect};

use crate::common::builder::config::ConfigBuilder;
use crate::common::harness::init_tracing;

const BUFFER: u32 = 0x0060_0000;

fn config() -> Config {
    ConfigBuilder::new().small_clear().memory_latency(4).build()
}

fn simulator(config: &Config) -> Simulator {
    init_tracing();
    Simulator::new(config).unwrap()
}

fn word_at(sim: &Simulator, layout: &TileLayout, x: i32, y: i32) -> u32 {
    sim.memory().read_u32(BUFFER + layout.pixel_to_memory(x, y, 400, 4))
}

/// Samples sent downstream, without the end-of-batch stamp.
fn drawn(sim: &mut Simulator) -> Vec<bool> {
    sim.take_output()
        .into_iter()
        .filter(|o| !o.sample.is_end_of_batch())
        .map(|o| o.sample.culled)
        .collect()
}

// ══════════════════════════════════════════════════════════
// Depth
// ══════════════════════════════════════════════════════════

#[test]
fn test_frame_writes_depth_to_memory() {
    let config = config();
    let layout = config.zstencil.tiling;
    let mut sim = simulator(&config);

    sim.write_register(GpuRegister::DepthTest, RegisterValue::Bool(true));
    let _ = sim.settle().unwrap();
    let _ = sim.clear().unwrap();
    let _ = sim
        .draw(workload::rectangle(&layout, Rect::new(0, 0, 6, 6), 0x1000, 1))
        .unwrap();

    assert_eq!(drawn(&mut sim), vec![false; 36]);
    let _ = sim.swap().unwrap();

    assert_eq!(word_at(&sim, &layout, 0, 0), 0x1000);
    assert_eq!(word_at(&sim, &layout, 5, 5), 0x1000);
    // Same line, outside the rectangle: the clear value reaches memory too.
    assert_eq!(word_at(&sim, &layout, 7, 7), 0x00ff_ffff);
    // Never fetched.
    assert_eq!(word_at(&sim, &layout, 8, 0), 0);
    assert_eq!(sim.unit().frames(), 1);
    assert_eq!(sim.observed_state(), RasterizerState::Ready);
}

/// A second rectangle behind the first is hidden entirely.
#[test]
fn test_hidden_rectangle_is_culled() {
    let config = config();
    let layout = config.zstencil.tiling;
    let mut sim = simulator(&config);

    sim.write_register(GpuRegister::DepthTest, RegisterValue::Bool(true));
    sim.write_register(GpuRegister::DepthFunction, RegisterValue::Compare(CompareMode::Less));
    let _ = sim.settle().unwrap();
    let _ = sim.clear().unwrap();

    let rect = Rect::new(4, 4, 12, 6);
    let _ = sim.draw(workload::rectangle(&layout, rect, 0x1000, 1)).unwrap();
    let _ = sim.take_output();
    let _ = sim.draw(workload::rectangle(&layout, rect, 0x2000, 2)).unwrap();
    assert!(drawn(&mut sim).iter().all(|&culled| culled));

    let _ = sim.draw(workload::rectangle(&layout, rect, 0x0800, 3)).unwrap();
    let visible = drawn(&mut sim).iter().filter(|&&culled| !culled).count();
    assert_eq!(visible, 12 * 6);

    let _ = sim.swap().unwrap();
    assert_eq!(word_at(&sim, &layout, 4, 4), 0x0800);
    assert_eq!(word_at(&sim, &layout, 15, 9), 0x0800);
}

#[test]
fn test_stencil_counts_overdraw() {
    let config = config();
    let layout = config.zstencil.tiling;
    let mut sim = simulator(&config);

    sim.write_register(GpuRegister::StencilTest, RegisterValue::Bool(true));
    sim.write_register(GpuRegister::StencilFunction, RegisterValue::Compare(CompareMode::Always));
    sim.write_register(GpuRegister::DepthPassUpdate, RegisterValue::StencilOp(StencilOp::Increment));
    let _ = sim.settle().unwrap();
    let _ = sim.clear().unwrap();

    let _ = sim.draw(workload::rectangle(&layout, Rect::new(0, 0, 4, 4), 0, 1)).unwrap();
    let _ = sim.draw(workload::rectangle(&layout, Rect::new(2, 2, 4, 4), 0, 2)).unwrap();
    let _ = sim.swap().unwrap();

    let word = word_at(&sim, &layout, 0, 0);
    assert_eq!(stencil_of(word), 1);
    assert_eq!(depth_of(word), 0x00ff_ffff);
    assert_eq!(stencil_of(word_at(&sim, &layout, 3, 3)), 2);
    assert_eq!(stencil_of(word_at(&sim, &layout, 5, 5)), 1);
}

/// Without any test the stage leaves the buffer alone.
#[test]
fn test_untested_batch_does_not_touch_memory() {
    let config = config();
    let layout = config.zstencil.tiling;
    let mut sim = simulator(&config);

    let _ = sim.draw(workload::rectangle(&layout, Rect::new(0, 0, 8, 8), 5, 1)).unwrap();
    let _ = sim.swap().unwrap();

    assert_eq!(word_at(&sim, &layout, 0, 0), 0);
    assert_eq!(sim.unit().stats().write_trans, 0);
    assert_eq!(sim.unit().stats().read_trans, 0);
}

// ══════════════════════════════════════════════════════════
// Destinations and hierarchical Z
// ══════════════════════════════════════════════════════════

#[test]
fn test_late_test_feeds_color_write() {
    let config = config();
    let layout = config.zstencil.tiling;
    let mut sim = simulator(&config);

    sim.write_register(GpuRegister::EarlyZ, RegisterValue::Bool(false));
    sim.write_register(GpuRegister::DepthTest, RegisterValue::Bool(true));
    let _ = sim.settle().unwrap();
    let _ = sim.clear().unwrap();
    let _ = sim.draw(workload::rectangle(&layout, Rect::new(0, 0, 4, 4), 7, 1)).unwrap();

    let output = sim.output();
    assert_eq!(output.len(), 5 * 4);
    assert!(output.iter().all(|o| o.destination == Destination::ColorWrite));
}

#[test]
fn test_write_backs_send_hierarchical_z_updates() {
    let config = ConfigBuilder::new()
        .small_clear()
        .memory_latency(4)
        .hz_updates()
        .build();
    let layout = config.zstencil.tiling;
    let mut sim = simulator(&config);

    sim.write_register(GpuRegister::DepthTest, RegisterValue::Bool(true));
    let _ = sim.settle().unwrap();
    let _ = sim.clear().unwrap();
    let _ = sim
        .draw(workload::rectangle(&layout, Rect::new(0, 0, 8, 8), 0x0100, 1))
        .unwrap();
    assert!(sim.hz_updates().is_empty());
    let _ = sim.swap().unwrap();

    // One 8x8 tile per line, fully covered by the rectangle.
    let updates = sim.hz_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].block, 0);
    assert_eq!(updates[0].z, 0x0100);
    assert_eq!(sim.unit().stats().hz_updates, 1);
}

// ══════════════════════════════════════════════════════════
// Failures
// ══════════════════════════════════════════════════════════

#[test]
fn test_blocked_downstream_times_out() {
    let config = ConfigBuilder::new().small_clear().max_cycles(500).build();
    let layout = config.zstencil.tiling;
    let mut sim = simulator(&config);
    sim.set_downstream_ready(false);

    let stamps = workload::rectangle(&layout, Rect::new(0, 0, 8, 8), 1, 1);
    match sim.draw(stamps) {
        Err(SimError::Timeout { awaited, state, cycles }) => {
            assert_eq!(awaited, RasterizerState::End);
            assert_eq!(state, RasterizerState::Drawing);
            assert_eq!(cycles, 500);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[test]
fn test_slow_clear_times_out() {
    let config = ConfigBuilder::new().max_cycles(5).build();
    let mut sim = simulator(&config);
    assert!(matches!(
        sim.clear(),
        Err(SimError::Timeout {
            awaited: RasterizerState::End,
            state: RasterizerState::Clear,
            cycles: 5,
        })
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ConfigBuilder::new().queue_size(1).build();
    assert!(matches!(Simulator::new(&config), Err(ConfigError::QueueTooSmall(1))));
}
