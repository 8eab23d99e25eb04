//! Framebuffer Layout Constants.
//!
//! This module defines constants shared by the Z/stencil stage and its cache:
//! 1. **Buffer Words:** Packing of the 24-bit depth and 8-bit stencil fields.
//! 2. **Geometry:** Bytes per pixel and the position attribute used for shader depth.
//! 3. **Flow Control:** Readiness reserve used towards the upstream unit.

/// Bytes used to store one depth/stencil sample (24-bit depth + 8-bit stencil).
pub const BYTES_PER_PIXEL: usize = 4;

/// Mask selecting the depth field of a depth/stencil buffer word.
pub const DEPTH_MASK: u32 = 0x00ff_ffff;

/// Shift of the stencil field inside a depth/stencil buffer word.
pub const STENCIL_SHIFT: u32 = 24;

/// Index of the position attribute inside a fragment attribute array.
///
/// Component 3 of this attribute carries the depth written by the fragment shader.
pub const POSITION_ATTRIBUTE: usize = 0;

/// Default number of cycles of ingestion kept in reserve before reporting `Busy`.
///
/// Covers the two cycle state round trip plus the interpolator latency of the
/// upstream unit (8 cycles).
pub const UPSTREAM_RESERVE_CYCLES: usize = 2 + 8;

/// Packs a depth and a stencil value into a buffer word.
#[inline]
pub const fn pack_depth_stencil(depth: u32, stencil: u8) -> u32 {
    ((stencil as u32) << STENCIL_SHIFT) | (depth & DEPTH_MASK)
}

/// Extracts the depth field from a buffer word.
#[inline]
pub const fn depth_of(word: u32) -> u32 {
    word & DEPTH_MASK
}

/// Extracts the stencil field from a buffer word.
#[inline]
pub const fn stencil_of(word: u32) -> u8 {
    (word >> STENCIL_SHIFT) as u8
}
