//! Simulator: owns the Z/stencil stage, the video memory and the stage's neighbors.
//!
//! The driver plays the command processor, the upstream rasterizer and both
//! downstream units. Every [`Simulator::tick`] runs one global cycle:
//! 1. **Neighbors:** Send at most one pending command, as many pending stamps as the
//!    stage allows and the downstream flow control.
//! 2. **Units:** Clock the stage, then the memory controller.
//! 3. **Observation:** Drain every signal the stage writes to the neighbors.

use std::collections::VecDeque;

use tracing::{debug, info};

use super::workload;
use crate::cache::{HzUpdate, TileCache, ZCache};
use crate::common::error::{ConfigError, SimError};
use crate::config::Config;
use crate::memory::VideoMemory;
use crate::rop::command::{RasterizerCommand, RasterizerState, UnitStatus};
use crate::rop::evaluator::{DepthStencilEvaluator, FragmentOperator};
use crate::rop::fragment::{FragmentInput, Stamp};
use crate::rop::ports::wire;
use crate::rop::registers::{GpuRegister, RegisterValue};
use crate::rop::zstencil::{Destination, ZStencilTest};
use crate::signal::{SignalRx, SignalTx};

/// A sample observed on one of the stage's output signals.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSample {
    /// Cycle the sample was read by the downstream unit.
    pub cycle: u64,
    /// Unit that received the sample.
    pub destination: Destination,
    /// The sample, with its final cull flag.
    pub sample: FragmentInput,
}

/// Top-level simulator: Z/stencil stage, video memory and neighbor models.
#[derive(Debug)]
pub struct Simulator {
    config: Config,
    unit: ZStencilTest,
    memory: VideoMemory,

    command: SignalTx<RasterizerCommand>,
    state: SignalRx<RasterizerState>,
    fragments: SignalTx<FragmentInput>,
    ffifo_output: SignalRx<FragmentInput>,
    color_output: SignalRx<FragmentInput>,
    ffifo_state: SignalTx<UnitStatus>,
    color_state: SignalTx<UnitStatus>,
    upstream_state: SignalRx<UnitStatus>,
    hz_update: SignalRx<HzUpdate>,

    pending_commands: VecDeque<RasterizerCommand>,
    pending_stamps: VecDeque<Stamp>,
    upstream_status: UnitStatus,
    observed_state: RasterizerState,
    downstream_ready: bool,
    output: Vec<OutputSample>,
    hz_updates: Vec<HzUpdate>,
    cycle: u64,
}

impl Simulator {
    /// Builds a simulator with a [`ZCache`] and a [`FragmentOperator`].
    ///
    /// # Errors
    ///
    /// Returns the first validation error of `config`.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = ZCache::new(
            &config.cache,
            config.zstencil.stamp_bytes(),
            config.zstencil.hz_enabled(),
        );
        Ok(Self::with_units(config, Box::new(cache), Box::new(FragmentOperator::new())))
    }

    /// Builds a simulator around caller-provided collaborators.
    ///
    /// `config` is expected to be valid.
    pub fn with_units(
        config: &Config,
        cache: Box<dyn TileCache>,
        evaluator: Box<dyn DepthStencilEvaluator>,
    ) -> Self {
        let (ports, peers) = wire(&config.zstencil);
        let memory = VideoMemory::new(&config.memory, peers.memory_request, peers.memory_data);
        let unit = ZStencilTest::new(&config.zstencil, ports, cache, evaluator);

        Self {
            config: config.clone(),
            unit,
            memory,
            command: peers.command,
            state: peers.state,
            fragments: peers.fragments,
            ffifo_output: peers.ffifo_output,
            color_output: peers.color_output,
            ffifo_state: peers.ffifo_state,
            color_state: peers.color_state,
            upstream_state: peers.upstream_state,
            hz_update: peers.hz_update,
            pending_commands: VecDeque::new(),
            pending_stamps: VecDeque::new(),
            upstream_status: UnitStatus::Busy,
            observed_state: RasterizerState::Reset,
            downstream_ready: true,
            output: Vec::new(),
            hz_updates: Vec::new(),
            cycle: 0,
        }
    }

    /// Next cycle to simulate.
    #[inline]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// The Z/stencil stage.
    #[inline]
    pub const fn unit(&self) -> &ZStencilTest {
        &self.unit
    }

    /// The video memory.
    #[inline]
    pub const fn memory(&self) -> &VideoMemory {
        &self.memory
    }

    /// Mutable video memory, for preloading buffers.
    #[inline]
    pub const fn memory_mut(&mut self) -> &mut VideoMemory {
        &mut self.memory
    }

    /// Samples received downstream so far.
    #[inline]
    pub fn output(&self) -> &[OutputSample] {
        &self.output
    }

    /// Takes the samples received downstream so far.
    pub fn take_output(&mut self) -> Vec<OutputSample> {
        std::mem::take(&mut self.output)
    }

    /// Hierarchical Z updates received so far.
    #[inline]
    pub fn hz_updates(&self) -> &[HzUpdate] {
        &self.hz_updates
    }

    /// Latest pipeline state published by the stage.
    #[inline]
    pub const fn observed_state(&self) -> RasterizerState {
        self.observed_state
    }

    /// Latest readiness published by the stage towards the upstream unit.
    #[inline]
    pub const fn upstream_status(&self) -> UnitStatus {
        self.upstream_status
    }

    /// Stamps not yet sent to the stage.
    #[inline]
    pub fn pending_stamps(&self) -> usize {
        self.pending_stamps.len()
    }

    /// Makes both downstream units report ready (`true`) or busy (`false`).
    pub const fn set_downstream_ready(&mut self, ready: bool) {
        self.downstream_ready = ready;
    }

    /// Queues a command for the stage.
    pub fn push_command(&mut self, command: RasterizerCommand) {
        self.pending_commands.push_back(command);
    }

    /// Queues a register write.
    pub fn write_register(&mut self, register: GpuRegister, value: RegisterValue) {
        self.push_command(RasterizerCommand::RegisterWrite {
            register,
            subreg: 0,
            value,
        });
    }

    /// Queues stamps for the stage.
    pub fn push_stamps(&mut self, stamps: impl IntoIterator<Item = Stamp>) {
        self.pending_stamps.extend(stamps);
    }

    /// Simulates one global cycle.
    ///
    /// # Errors
    ///
    /// Returns the protocol violation that stopped the stage or the memory.
    pub fn tick(&mut self) -> Result<(), SimError> {
        let cycle = self.cycle;

        if self.pending_commands.is_empty() && self.upstream_status == UnitStatus::Ready {
            for _ in 0..self.config.zstencil.stamps_cycle {
                let Some(stamp) = self.pending_stamps.pop_front() else {
                    break;
                };
                for sample in stamp {
                    self.fragments.write(cycle, sample)?;
                }
            }
        }
        if let Some(command) = self.pending_commands.pop_front() {
            self.command.write(cycle, command)?;
        }
        let status = if self.downstream_ready {
            UnitStatus::Ready
        } else {
            UnitStatus::Busy
        };
        self.ffifo_state.write(cycle, status)?;
        self.color_state.write(cycle, status)?;

        self.unit.clock(cycle)?;
        self.memory.clock(cycle)?;

        while let Some(state) = self.state.read(cycle) {
            self.observed_state = state;
        }
        while let Some(status) = self.upstream_state.read(cycle) {
            self.upstream_status = status;
        }
        for (rx, destination) in [
            (&self.ffifo_output, Destination::FragmentFifo),
            (&self.color_output, Destination::ColorWrite),
        ] {
            while let Some(sample) = rx.read(cycle) {
                self.output.push(OutputSample {
                    cycle,
                    destination,
                    sample,
                });
            }
        }
        while let Some(update) = self.hz_update.read(cycle) {
            self.hz_updates.push(update);
        }

        self.cycle += 1;
        Ok(())
    }

    /// Ticks until every queued command has been consumed and the stage is in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Timeout`] after `general.max_cycles` cycles, or the
    /// error that stopped a unit.
    pub fn run_until(&mut self, state: RasterizerState) -> Result<u64, SimError> {
        let start = self.cycle;
        loop {
            let settled = self.pending_commands.is_empty()
                && self.command.in_flight() == 0
                && self.unit.state() == state;
            if settled {
                return Ok(self.cycle - start);
            }
            let waited = self.cycle - start;
            if waited >= self.config.general.max_cycles {
                return Err(SimError::Timeout {
                    awaited: state,
                    state: self.unit.state(),
                    cycles: waited,
                });
            }
            self.tick()?;
        }
    }

    /// Runs a complete batch: `Draw`, the stamps, the end-of-batch stamp and `End`.
    ///
    /// # Errors
    ///
    /// As [`Simulator::run_until`].
    pub fn draw(&mut self, stamps: impl IntoIterator<Item = Stamp>) -> Result<u64, SimError> {
        let start = self.cycle;
        let _ = self.run_until(RasterizerState::Ready)?;
        self.push_command(RasterizerCommand::Draw);
        self.push_stamps(stamps);
        self.push_stamps([workload::end_of_batch(self.config.zstencil.group_size())]);
        let _ = self.run_until(RasterizerState::End)?;
        self.push_command(RasterizerCommand::End);
        let _ = self.run_until(RasterizerState::Ready)?;
        debug!(cycles = self.cycle - start, "batch finished");
        Ok(self.cycle - start)
    }

    /// Clears the depth/stencil buffer with the clear registers.
    ///
    /// # Errors
    ///
    /// As [`Simulator::run_until`].
    pub fn clear(&mut self) -> Result<u64, SimError> {
        self.finish_command(RasterizerCommand::Clear)
    }

    /// Ends the frame, writing every dirty cache line back to memory.
    ///
    /// # Errors
    ///
    /// As [`Simulator::run_until`].
    pub fn swap(&mut self) -> Result<u64, SimError> {
        self.finish_command(RasterizerCommand::Swap)
    }

    /// Applies every queued command (register writes) and waits for `Ready`.
    ///
    /// # Errors
    ///
    /// As [`Simulator::run_until`].
    pub fn settle(&mut self) -> Result<u64, SimError> {
        self.run_until(RasterizerState::Ready)
    }

    fn finish_command(&mut self, command: RasterizerCommand) -> Result<u64, SimError> {
        let start = self.cycle;
        let _ = self.run_until(RasterizerState::Ready)?;
        info!(cycle = self.cycle, command = command.name(), "issuing command");
        self.push_command(command);
        let _ = self.run_until(RasterizerState::End)?;
        self.push_command(RasterizerCommand::End);
        let _ = self.run_until(RasterizerState::Ready)?;
        Ok(self.cycle - start)
    }
}
