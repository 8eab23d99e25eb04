//! Z/Stencil Stage Configuration Registers.
//!
//! This module holds the register file of the Z/stencil stage. It provides:
//! 1. **Register Space:** The [`GpuRegister`] identifiers owned by this stage.
//! 2. **Values:** The tagged [`RegisterValue`] carried by register writes.
//! 3. **State:** [`ZStencilRegisters`], the typed register file with its power-on values.
//!
//! Registers can only change through register write commands, which the stage
//! accepts only while idle.

use tracing::debug;

use crate::common::error::ZStencilError;

/// Comparison function for the depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    /// Never passes.
    Never,
    /// Always passes.
    #[default]
    Always,
    /// Passes if the incoming value is less than the stored value.
    Less,
    /// Passes if the incoming value is less than or equal to the stored value.
    LessEqual,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the incoming value is greater than or equal to the stored value.
    GreaterEqual,
    /// Passes if the incoming value is greater than the stored value.
    Greater,
    /// Passes if the values differ.
    NotEqual,
}

impl CompareMode {
    /// Applies the comparison to an incoming and a stored value.
    #[inline]
    pub fn compare(self, incoming: u32, stored: u32) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Less => incoming < stored,
            Self::LessEqual => incoming <= stored,
            Self::Equal => incoming == stored,
            Self::GreaterEqual => incoming >= stored,
            Self::Greater => incoming > stored,
            Self::NotEqual => incoming != stored,
        }
    }
}

/// Stencil buffer update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilOp {
    /// Keep the stored value.
    #[default]
    Keep,
    /// Set to zero.
    Zero,
    /// Set to the reference value.
    Replace,
    /// Increment, saturating at 255.
    Increment,
    /// Decrement, saturating at 0.
    Decrement,
    /// Bitwise invert.
    Invert,
    /// Increment with wrap-around.
    IncrementWrap,
    /// Decrement with wrap-around.
    DecrementWrap,
}

impl StencilOp {
    /// Computes the new stencil value before the update mask is applied.
    #[inline]
    pub const fn apply(self, stored: u8, reference: u8) -> u8 {
        match self {
            Self::Keep => stored,
            Self::Zero => 0,
            Self::Replace => reference,
            Self::Increment => stored.saturating_add(1),
            Self::Decrement => stored.saturating_sub(1),
            Self::Invert => !stored,
            Self::IncrementWrap => stored.wrapping_add(1),
            Self::DecrementWrap => stored.wrapping_sub(1),
        }
    }
}

/// Registers owned by the Z/stencil stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuRegister {
    /// Display horizontal resolution.
    DisplayXRes,
    /// Display vertical resolution.
    DisplayYRes,
    /// Viewport initial x coordinate.
    ViewportIniX,
    /// Viewport initial y coordinate.
    ViewportIniY,
    /// Viewport width.
    ViewportWidth,
    /// Viewport height.
    ViewportHeight,
    /// Depth clear value.
    ZBufferClear,
    /// Stencil clear value.
    StencilBufferClear,
    /// Depth buffer bit precision.
    ZBufferBitPrecision,
    /// Base address of the depth/stencil buffer.
    ZStencilBufferAddr,
    /// Run the test before shading.
    EarlyZ,
    /// Fragment shader writes the fragment depth.
    ModifyFragmentDepth,
    /// Stencil test enable.
    StencilTest,
    /// Stencil comparison function.
    StencilFunction,
    /// Stencil reference value.
    StencilReference,
    /// Stencil compare mask.
    StencilCompareMask,
    /// Stencil update mask.
    StencilUpdateMask,
    /// Update applied when the stencil test fails.
    StencilFailUpdate,
    /// Update applied when the depth test fails.
    DepthFailUpdate,
    /// Update applied when both tests pass.
    DepthPassUpdate,
    /// Depth test enable.
    DepthTest,
    /// Depth comparison function.
    DepthFunction,
    /// Depth write enable.
    DepthMask,
}

/// Value carried by a register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterValue {
    /// Unsigned integer.
    Uint(u32),
    /// Signed integer.
    Int(i32),
    /// Flag.
    Bool(bool),
    /// Comparison function.
    Compare(CompareMode),
    /// Stencil update operation.
    StencilOp(StencilOp),
}

mod defaults {
    pub const DISPLAY_RES: u32 = 400;
    pub const CLEAR_DEPTH: u32 = 0x00ff_ffff;
    pub const DEPTH_PRECISION: u32 = 24;
    pub const ZSTENCIL_BUFFER: u32 = 0x0060_0000;
    pub const STENCIL_MASK: u8 = 0xff;
}

/// Register file of the Z/stencil stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZStencilRegisters {
    /// Display horizontal resolution in pixels.
    pub x_res: u32,
    /// Display vertical resolution in pixels.
    pub y_res: u32,
    /// Viewport initial x coordinate.
    pub viewport_x: i32,
    /// Viewport initial y coordinate.
    pub viewport_y: i32,
    /// Viewport width.
    pub viewport_width: u32,
    /// Viewport height.
    pub viewport_height: u32,
    /// Depth written by a clear.
    pub clear_depth: u32,
    /// Stencil written by a clear.
    pub clear_stencil: u8,
    /// Bits of depth precision.
    pub depth_precision: u32,
    /// Base address of the depth/stencil buffer.
    pub zstencil_buffer: u32,
    /// Test before shading (output to the fragment FIFO) instead of after (output to color write).
    pub early_z: bool,
    /// Take the depth from the shader output instead of the rasterizer.
    pub modify_depth: bool,
    /// Stencil test enable.
    pub stencil_test: bool,
    /// Stencil comparison function.
    pub stencil_function: CompareMode,
    /// Stencil reference value.
    pub stencil_reference: u8,
    /// Mask applied to both sides of the stencil comparison.
    pub stencil_test_mask: u8,
    /// Bits of the stencil value that updates may modify.
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
}

impl Default for ZStencilRegisters {
    fn default() -> Self {
        Self {
            x_res: defaults::DISPLAY_RES,
            y_res: defaults::DISPLAY_RES,
            viewport_x: 0,
            viewport_y: 0,
            viewport_width: defaults::DISPLAY_RES,
            viewport_height: defaults::DISPLAY_RES,
            clear_depth: defaults::CLEAR_DEPTH,
            clear_stencil: 0,
            depth_precision: defaults::DEPTH_PRECISION,
            zstencil_buffer: defaults::ZSTENCIL_BUFFER,
            early_z: true,
            modify_depth: false,
            stencil_test: false,
            stencil_function: CompareMode::Always,
            stencil_reference: 0,
            stencil_test_mask: defaults::STENCIL_MASK,
            stencil_update_mask: defaults::STENCIL_MASK,
            stencil_fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            depth_pass: StencilOp::Keep,
            depth_test: false,
            depth_function: CompareMode::Less,
            depth_mask: true,
        }
    }
}

impl ZStencilRegisters {
    /// Returns true if either test reads the buffer.
    #[inline]
    pub const fn test_enabled(&self) -> bool {
        self.depth_test || self.stencil_test
    }

    /// Stores a register value.
    ///
    /// # Arguments
    ///
    /// * `register` - Register to write.
    /// * `value` - New value; its variant must match the register type.
    ///
    /// # Errors
    ///
    /// Returns [`ZStencilError::MistypedRegister`] if the value variant does not
    /// match the register. The register file is left unchanged.
    pub fn write(&mut self, register: GpuRegister, value: RegisterValue) -> Result<(), ZStencilError> {
        use GpuRegister as R;
        use RegisterValue as V;

        match (register, value) {
            (R::DisplayXRes, V::Uint(v)) => self.x_res = v,
            (R::DisplayYRes, V::Uint(v)) => self.y_res = v,
            (R::ViewportIniX, V::Int(v)) => self.viewport_x = v,
            (R::ViewportIniY, V::Int(v)) => self.viewport_y = v,
            (R::ViewportWidth, V::Uint(v)) => self.viewport_width = v,
            (R::ViewportHeight, V::Uint(v)) => self.viewport_height = v,
            (R::ZBufferClear, V::Uint(v)) => self.clear_depth = v,
            (R::StencilBufferClear, V::Uint(v)) => self.clear_stencil = (v & 0xff) as u8,
            (R::ZBufferBitPrecision, V::Uint(v)) => self.depth_precision = v,
            (R::ZStencilBufferAddr, V::Uint(v)) => self.zstencil_buffer = v,
            (R::EarlyZ, V::Bool(v)) => self.early_z = v,
            (R::ModifyFragmentDepth, V::Bool(v)) => self.modify_depth = v,
            (R::StencilTest, V::Bool(v)) => self.stencil_test = v,
            (R::StencilFunction, V::Compare(v)) => self.stencil_function = v,
            (R::StencilReference, V::Uint(v)) => self.stencil_reference = (v & 0xff) as u8,
            (R::StencilCompareMask, V::Uint(v)) => self.stencil_test_mask = (v & 0xff) as u8,
            (R::StencilUpdateMask, V::Uint(v)) => self.stencil_update_mask = (v & 0xff) as u8,
            (R::StencilFailUpdate, V::StencilOp(v)) => self.stencil_fail = v,
            (R::DepthFailUpdate, V::StencilOp(v)) => self.depth_fail = v,
            (R::DepthPassUpdate, V::StencilOp(v)) => self.depth_pass = v,
            (R::DepthTest, V::Bool(v)) => self.depth_test = v,
            (R::DepthFunction, V::Compare(v)) => self.depth_function = v,
            (R::DepthMask, V::Bool(v)) => self.depth_mask = v,
            (register, value) => return Err(ZStencilError::MistypedRegister { register, value }),
        }

        debug!(?register, ?value, "ZStencilTest register write");
        Ok(())
    }
}
