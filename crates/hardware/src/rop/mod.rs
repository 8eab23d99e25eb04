//! Raster Operations: the Z/Stencil Test Stage.
//!
//! This module contains everything the stage needs besides the tile cache. It provides:
//! 1. **Protocol:** Commands, pipeline states and flow control ([`command`]).
//! 2. **Registers:** The GPU register subset the stage reacts to ([`registers`]).
//! 3. **Payloads:** Fragments and stamps ([`fragment`]).
//! 4. **Arithmetic:** Depth/stencil comparison and update ([`evaluator`]).
//! 5. **Pipeline:** The stamp ring ([`queue`]), signal wiring ([`ports`]) and the
//!    stage itself ([`zstencil`]).

/// Rasterizer commands, pipeline states and unit flow control.
pub mod command;
/// Depth/stencil test arithmetic.
pub mod evaluator;
/// Fragments and stamps.
pub mod fragment;
/// Signal wiring of the stage.
pub mod ports;
/// Ring of in-flight stamps.
pub mod queue;
/// Register file of the stage.
pub mod registers;
/// The Z/stencil test stage.
pub mod zstencil;

pub use command::{RasterizerCommand, RasterizerState, UnitStatus};
pub use evaluator::{DepthStencilEvaluator, DepthStencilState, FragmentOperator};
pub use fragment::{Fragment, FragmentInput, Stamp};
pub use ports::{ZOperation, ZStencilPeers, ZStencilPorts, wire};
pub use registers::{CompareMode, GpuRegister, RegisterValue, StencilOp, ZStencilRegisters};
pub use zstencil::{Destination, ZStencilTest};
