//! GPU Z/stencil test stage simulator library.
//!
//! This crate implements a cycle-accurate model of the depth/stencil test stage of a
//! GPU raster pipeline with the following:
//! 1. **Stage:** Stamp ingestion, in-order fetch/read/test/write pipeline with
//!    read-after-write protection, output flow control and the command state machine.
//! 2. **Cache:** Set-associative depth/stencil tile cache with fast clear, write-back
//!    and hierarchical Z update generation.
//! 3. **Memory:** Transactions and a fixed-latency video memory model.
//! 4. **Signals:** Fixed-latency, fixed-bandwidth channels connecting the units.
//! 5. **Simulation:** Configuration, cycle driver, synthetic workloads and statistics.

/// Depth/stencil tile cache (trait, implementation, replacement policies).
pub mod cache;
/// Common types and constants (word layout, errors, framebuffer tiling).
pub mod common;
/// Simulator configuration (defaults and hierarchical config structures).
pub mod config;
/// Video memory transactions and controller model.
pub mod memory;
/// The Z/stencil stage and its commands, registers and payloads.
pub mod rop;
/// Inter-unit signals.
pub mod signal;
/// Cycle driver and synthetic workloads.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or load it from JSON.
pub use crate::config::Config;
/// The Z/stencil stage; construct with `ZStencilTest::new` from the ends returned by `rop::wire`.
pub use crate::rop::ZStencilTest;
/// Top-level driver owning the stage, the memory and the neighbor models.
pub use crate::sim::Simulator;
