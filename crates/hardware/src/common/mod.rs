//! Common utilities and types shared by every component of the simulator.
//!
//! This module provides the fundamental building blocks used across the stage,
//! the cache and the simulator driver. It includes:
//! 1. **Constants:** Framebuffer word layout and default stamp geometry.
//! 2. **Error Handling:** Fatal protocol violations and configuration errors.
//! 3. **Tiling:** Translation of device pixel coordinates into framebuffer offsets.

/// Framebuffer layout and geometry constants.
pub mod constants;

/// Error types for protocol violations and configuration validation.
pub mod error;

/// Framebuffer tiling and pixel-to-memory address translation.
pub mod tiling;

pub use error::{ConfigError, SimError, ZStencilError};
pub use tiling::TileLayout;
