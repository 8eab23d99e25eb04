//! Rasterizer commands and unit states.
//!
//! The command processor drives every fragment stage through the same small
//! protocol: a command per cycle on the command signal, and the unit answers
//! with its pipeline state on the state signal.

use std::fmt;

use super::registers::{GpuRegister, RegisterValue};

/// Command sent by the command processor to a rasterizer stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RasterizerCommand {
    /// Return to the power-on state.
    Reset,
    /// Start processing a batch of stamps.
    Draw,
    /// Acknowledge the end of a batch, swap or clear.
    End,
    /// Write a configuration register.
    RegisterWrite {
        /// Register to write.
        register: GpuRegister,
        /// Sub-register index (unused by the registers of this stage).
        subreg: u32,
        /// Value to store.
        value: RegisterValue,
    },
    /// End of frame: flush the buffer to memory.
    Swap,
    /// Clear the depth/stencil buffer to the clear values.
    Clear,
}

impl RasterizerCommand {
    /// Short command name used in traces and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Reset => "RESET",
            Self::Draw => "DRAW",
            Self::End => "END",
            Self::RegisterWrite { .. } => "REG_WRITE",
            Self::Swap => "SWAP",
            Self::Clear => "CLEAR",
        }
    }
}

/// Pipeline state of a rasterizer stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RasterizerState {
    /// Initializing; becomes `Ready` on the next cycle.
    #[default]
    Reset,
    /// Idle, accepting configuration and batch commands.
    Ready,
    /// Processing a batch.
    Drawing,
    /// Finished the last command, waiting for `End`.
    End,
    /// Flushing the buffer at the end of a frame.
    Swap,
    /// Clearing the buffer.
    Clear,
}

impl fmt::Display for RasterizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reset => "RESET",
            Self::Ready => "READY",
            Self::Drawing => "DRAWING",
            Self::End => "END",
            Self::Swap => "SWAP",
            Self::Clear => "CLEAR",
        };
        f.write_str(name)
    }
}

/// Flow control state exchanged between neighboring stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitStatus {
    /// The unit accepts new work this cycle.
    Ready,
    /// The unit cannot accept new work this cycle.
    #[default]
    Busy,
}
