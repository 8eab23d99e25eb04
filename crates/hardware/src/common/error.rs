//! Fatal errors raised by the simulator.
//!
//! This module defines the error families of the simulator. It provides:
//! 1. **Protocol Violations:** Raised by the Z/stencil stage when a neighbor breaks
//!    the command, stamp or signal protocol. These halt the simulation.
//! 2. **Driver Errors:** Protocol violations and timeouts seen by the simulator driver.
//! 3. **Configuration Errors:** Raised while parsing or validating a configuration,
//!    before any unit is built.
//!
//! Cache contention and backpressure are not errors; they are retried every cycle
//! and only show up in the statistics.

use std::path::PathBuf;

use thiserror::Error;

use crate::rop::command::RasterizerState;
use crate::rop::registers::{GpuRegister, RegisterValue};
use crate::signal::SignalError;

/// Fatal protocol violation detected by the Z/stencil stage.
///
/// Any of these indicates a bug in a neighboring unit (or in the unit itself),
/// never a runtime condition, so the cycle driver stops on the first one.
#[derive(Debug, Error)]
pub enum ZStencilError {
    /// A command arrived while the stage was in a state that forbids it.
    #[error("{command} command can only be received in {required:?} state (current state {current:?})")]
    CommandInWrongState {
        /// Name of the offending command.
        command: &'static str,
        /// State the command requires.
        required: RasterizerState,
        /// State the stage was in.
        current: RasterizerState,
    },

    /// Only part of a stamp was present on the fragment signal.
    #[error("missing fragments in a stamp: received {received} of {expected}")]
    IncompleteStamp {
        /// Samples read before the signal ran dry.
        received: usize,
        /// Samples in a stamp.
        expected: usize,
    },

    /// A sample without a fragment was found inside a regular stamp, or a
    /// sample with a fragment inside the end-of-batch stamp.
    #[error("stamp mixes empty and non-empty samples (sample {sample})")]
    MixedSentinelStamp {
        /// Index of the offending sample inside the stamp.
        sample: usize,
    },

    /// A stamp was received after the end-of-batch stamp of the current batch.
    #[error("stamp received after the end of the batch")]
    StampAfterEndOfBatch,

    /// A register write carried a value of the wrong type.
    #[error("register {register:?} cannot hold value {value:?}")]
    MistypedRegister {
        /// Register being written.
        register: GpuRegister,
        /// Value that was rejected.
        value: RegisterValue,
    },

    /// The depth buffer base is not aligned to a stamp, so stamps would straddle cache lines.
    #[error("depth buffer address {address:#x} is not aligned to the {alignment}-byte stamp")]
    UnalignedBufferAddress {
        /// Address written to the register.
        address: u32,
        /// Bytes in one stamp.
        alignment: usize,
    },

    /// A completed test operation named a queue entry that is not being tested.
    #[error("test operation completed for queue entry {entry} which is not in test")]
    OrphanTestOperation {
        /// Queue index carried by the operation.
        entry: usize,
    },

    /// A signal was written beyond its bandwidth or out of cycle order.
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Error that stops the simulator driver.
#[derive(Debug, Error)]
pub enum SimError {
    /// The Z/stencil stage reported a protocol violation.
    #[error("Z/stencil stage: {0}")]
    Stage(#[from] ZStencilError),

    /// A unit driven by the simulator misused a signal.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// The stage did not reach the awaited state within the cycle limit.
    #[error("stage still in {state} state after {cycles} cycles waiting for {awaited}")]
    Timeout {
        /// State the driver was waiting for.
        awaited: RasterizerState,
        /// State the stage was in when the driver gave up.
        state: RasterizerState,
        /// Cycles waited.
        cycles: u64,
    },
}

/// Error produced while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter that must be non-zero was zero.
    #[error("{0} must be at least 1")]
    Zero(&'static str),

    /// A parameter that must be a power of two was not.
    #[error("{field} must be a power of two (got {value})")]
    NotPowerOfTwo {
        /// Offending parameter.
        field: &'static str,
        /// Value found.
        value: usize,
    },

    /// Only 32-bit depth/stencil words are supported.
    #[error("only 32-bit depth/stencil values are supported (got {0} bytes per pixel)")]
    UnsupportedPixelSize(usize),

    /// The stamp queue must hold at least two entries.
    #[error("Z queue requires at least two entries (got {0})")]
    QueueTooSmall(usize),

    /// The upstream reserve exceeds the queue, so the stage would never accept stamps.
    #[error("upstream reserve of {reserve} entries exceeds the Z queue of {queue_size} entries")]
    ReserveExceedsQueue {
        /// Entries kept free for stamps already in flight upstream.
        reserve: usize,
        /// Entries in the queue.
        queue_size: usize,
    },

    /// Compression needs full 8x8 tiles per cache line.
    #[error("Z compression requires at least 16 stamps per cache line (got {0})")]
    CompressionLineTooSmall(usize),

    /// Hierarchical Z updates are produced by the compressor.
    #[error("hierarchical Z update requires Z compression")]
    HzUpdateWithoutCompression,

    /// The configuration text is not valid JSON for the configuration tree.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}
