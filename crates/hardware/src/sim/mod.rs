//! Simulation driver and synthetic workloads.
//!
//! Provides the cycle loop that connects the Z/stencil stage to its memory and
//! neighbor models, and generators for stamp streams.

/// Cycle driver.
pub mod simulator;
/// Synthetic stamp streams.
pub mod workload;

pub use simulator::{OutputSample, Simulator};
pub use workload::Rect;
