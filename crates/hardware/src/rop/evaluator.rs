//! Depth and Stencil Test Arithmetic.
//!
//! This module implements the per-sample test performed when a stamp leaves the
//! test pipeline. It provides:
//! 1. **State:** [`DepthStencilState`], the test configuration latched at the start of a batch.
//! 2. **Contract:** The [`DepthStencilEvaluator`] trait used by the stage.
//! 3. **Implementation:** [`FragmentOperator`], the standard stencil-then-depth test
//!    with stencil update operations and depth/stencil write masks.
//!
//! Buffer words are little-endian `u32` values with the stencil in the top byte and
//! the depth in the low 24 bits.

use crate::common::constants::{DEPTH_MASK, depth_of, pack_depth_stencil, stencil_of};

use super::registers::{CompareMode, StencilOp, ZStencilRegisters};

/// Test configuration applied to every stamp of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    /// Stencil test enable.
    pub stencil_test: bool,
    /// Stencil comparison function.
    pub stencil_function: CompareMode,
    /// Stencil reference value.
    pub stencil_reference: u8,
    /// Mask applied to both operands of the stencil comparison.
    pub stencil_test_mask: u8,
    /// Stencil bits that updates may modify.
    pub stencil_update_mask: u8,
    /// Update when the stencil test fails.
    pub stencil_fail: StencilOp,
    /// Update when the depth test fails.
    pub depth_fail: StencilOp,
    /// Update when both tests pass.
    pub depth_pass: StencilOp,
    /// Depth test enable.
    pub depth_test: bool,
    /// Depth comparison function.
    pub depth_function: CompareMode,
    /// Depth write enable.
    pub depth_mask: bool,
    /// Depth buffer bit precision.
    pub depth_precision: u32,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self::from(&ZStencilRegisters::default())
    }
}

impl From<&ZStencilRegisters> for DepthStencilState {
    fn from(regs: &ZStencilRegisters) -> Self {
        Self {
            stencil_test: regs.stencil_test,
            stencil_function: regs.stencil_function,
            stencil_reference: regs.stencil_reference,
            stencil_test_mask: regs.stencil_test_mask,
            stencil_update_mask: regs.stencil_update_mask,
            stencil_fail: regs.stencil_fail,
            depth_fail: regs.depth_fail,
            depth_pass: regs.depth_pass,
            depth_test: regs.depth_test,
            depth_function: regs.depth_function,
            depth_mask: regs.depth_mask,
            depth_precision: regs.depth_precision,
        }
    }
}

/// Performs the depth and stencil test of a stamp.
pub trait DepthStencilEvaluator {
    /// Latches the test configuration for the following stamps.
    fn configure(&mut self, state: DepthStencilState);

    /// Tests every sample of a stamp against the stored buffer words.
    ///
    /// # Arguments
    ///
    /// * `in_depth` - Incoming depth per sample.
    /// * `buffer` - Stored words, four bytes per sample; updated in place.
    /// * `culled` - Per-sample cull flags; samples already culled are left
    ///   untouched and samples failing a test are culled.
    fn stencil_z_test(&self, in_depth: &[u32], buffer: &mut [u8], culled: &mut [bool]);

    /// Converts a `[0, 1]` depth to fixed point in the configured precision.
    fn convert_z(&self, z: f32) -> u32;
}

/// Standard depth/stencil test unit.
#[derive(Debug, Clone, Default)]
pub struct FragmentOperator {
    state: DepthStencilState,
}

impl FragmentOperator {
    /// Creates a fragment operator with the power-on configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently latched configuration.
    pub const fn state(&self) -> &DepthStencilState {
        &self.state
    }

    fn update_stencil(&self, op: StencilOp, stored: u8) -> u8 {
        if !self.state.stencil_test {
            return stored;
        }
        let mask = self.state.stencil_update_mask;
        let updated = op.apply(stored, self.state.stencil_reference);
        (stored & !mask) | (updated & mask)
    }

    /// Tests one sample and returns the new buffer word and whether the sample survives.
    fn test_sample(&self, in_depth: u32, word: u32) -> (u32, bool) {
        let s = &self.state;
        let depth = depth_of(word);
        let stencil = stencil_of(word);

        if s.stencil_test {
            let mask = s.stencil_test_mask;
            let passed = s
                .stencil_function
                .compare(u32::from(s.stencil_reference & mask), u32::from(stencil & mask));
            if !passed {
                let stencil = self.update_stencil(s.stencil_fail, stencil);
                return (pack_depth_stencil(depth, stencil), false);
            }
        }

        if s.depth_test {
            let in_depth = in_depth & DEPTH_MASK;
            if !s.depth_function.compare(in_depth, depth) {
                let stencil = self.update_stencil(s.depth_fail, stencil);
                return (pack_depth_stencil(depth, stencil), false);
            }
            let stencil = self.update_stencil(s.depth_pass, stencil);
            let depth = if s.depth_mask { in_depth } else { depth };
            return (pack_depth_stencil(depth, stencil), true);
        }

        let stencil = self.update_stencil(s.depth_pass, stencil);
        (pack_depth_stencil(depth, stencil), true)
    }
}

impl DepthStencilEvaluator for FragmentOperator {
    fn configure(&mut self, state: DepthStencilState) {
        self.state = state;
    }

    fn stencil_z_test(&self, in_depth: &[u32], buffer: &mut [u8], culled: &mut [bool]) {
        for ((&z, word), cull) in in_depth.iter().zip(buffer.chunks_exact_mut(4)).zip(culled.iter_mut()) {
            if *cull {
                continue;
            }
            let stored = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            let (updated, survives) = self.test_sample(z, stored);
            word.copy_from_slice(&updated.to_le_bytes());
            *cull = !survives;
        }
    }

    fn convert_z(&self, z: f32) -> u32 {
        let precision = self.state.depth_precision.min(24);
        let max = ((1u64 << precision) - 1) as f64;
        (f64::from(z.clamp(0.0, 1.0)) * max) as u32
    }
}
