//! Z/Stencil Test Stage.
//!
//! The stage tests stamps of fragments against the depth/stencil buffer and
//! forwards them, with updated cull flags, to the next fragment stage. Each call to
//! [`ZStencilTest::clock`] simulates one cycle:
//! 1. **Memory:** Deliver memory data to the tile cache, advance the cache and send
//!    the memory transaction and hierarchical Z update it produced.
//! 2. **Flow Control:** Latch the state of both downstream units.
//! 3. **State Machine:** Run the command state machine; while drawing, run the
//!    ingest, fetch, read, test, write, end-of-batch and output stages in that order.
//! 4. **Publication:** Report readiness upstream and the pipeline state.
//!
//! Stamps are tested in arrival order and leave in arrival order. A stamp never
//! reads a buffer address before every older stamp with the same address has
//! written it back.

use std::fmt;

use tracing::{debug, trace};

use super::command::{RasterizerCommand, RasterizerState, UnitStatus};
use super::evaluator::{DepthStencilEvaluator, DepthStencilState};
use super::fragment::{FragmentInput, Stamp};
use super::ports::{ZOperation, ZStencilPorts};
use super::queue::{EntryPhase, QueueCounters, StampQueue};
use super::registers::{GpuRegister, RegisterValue, ZStencilRegisters};
use crate::cache::{ClearStatus, TileCache};
use crate::common::constants::POSITION_ATTRIBUTE;
use crate::common::error::ZStencilError;
use crate::config::ZStencilConfig;
use crate::memory::{MemoryState, MemoryTransaction};
use crate::signal::SignalTx;
use crate::stats::ZStencilStats;

/// Unit that receives the tested stamps of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// Fragment FIFO, when the test runs before shading.
    #[default]
    FragmentFifo,
    /// Color write, when the test runs after shading.
    ColorWrite,
}

/// The Z/stencil test pipeline stage.
pub struct ZStencilTest {
    config: ZStencilConfig,
    ports: ZStencilPorts,
    cache: Box<dyn TileCache>,
    evaluator: Box<dyn DepthStencilEvaluator>,
    registers: ZStencilRegisters,
    queue: StampQueue,
    state: RasterizerState,
    group: usize,
    /// Cycles until the next test may be issued.
    test_cycles: u32,
    /// The end-of-batch stamp has been received.
    last_fragment: bool,
    destination: Destination,
    ffifo_status: UnitStatus,
    color_status: UnitStatus,
    memory_state: MemoryState,
    current_triangle: Option<u32>,
    triangles: u64,
    fragments: u64,
    frames: u64,
    batches: u64,
    stats: ZStencilStats,
}

impl fmt::Debug for ZStencilTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZStencilTest")
            .field("state", &self.state)
            .field("counters", &self.queue.counters())
            .field("test_cycles", &self.test_cycles)
            .field("last_fragment", &self.last_fragment)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl ZStencilTest {
    /// Creates the stage in the `Reset` state.
    ///
    /// # Arguments
    ///
    /// * `config` - Stage parameters (validated).
    /// * `ports` - Signal ends owned by the stage, see [`super::ports::wire`].
    /// * `cache` - Tile cache holding the depth/stencil buffer.
    /// * `evaluator` - Depth/stencil test arithmetic.
    pub fn new(
        config: &ZStencilConfig,
        ports: ZStencilPorts,
        cache: Box<dyn TileCache>,
        evaluator: Box<dyn DepthStencilEvaluator>,
    ) -> Self {
        let group = config.group_size();
        Self {
            config: config.clone(),
            ports,
            cache,
            evaluator,
            registers: ZStencilRegisters::default(),
            queue: StampQueue::new(config.queue_size, group),
            state: RasterizerState::Reset,
            group,
            test_cycles: 0,
            last_fragment: false,
            destination: Destination::default(),
            ffifo_status: UnitStatus::Busy,
            color_status: UnitStatus::Busy,
            memory_state: MemoryState::None,
            current_triangle: None,
            triangles: 0,
            fragments: 0,
            frames: 0,
            batches: 0,
            stats: ZStencilStats::default(),
        }
    }

    /// Current pipeline state.
    #[inline]
    pub const fn state(&self) -> RasterizerState {
        self.state
    }

    /// Current register file.
    #[inline]
    pub const fn registers(&self) -> &ZStencilRegisters {
        &self.registers
    }

    /// Stage counters of the stamp queue.
    #[inline]
    pub const fn queue_counters(&self) -> QueueCounters {
        self.queue.counters()
    }

    /// Cycles until the next test may be issued.
    #[inline]
    pub const fn test_cycles(&self) -> u32 {
        self.test_cycles
    }

    /// Unit receiving the current batch.
    #[inline]
    pub const fn destination(&self) -> Destination {
        self.destination
    }

    /// Collected statistics.
    #[inline]
    pub const fn stats(&self) -> &ZStencilStats {
        &self.stats
    }

    /// Frames finished with a swap.
    #[inline]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// One line summary of the stage for status dumps.
    pub fn state_summary(&self) -> String {
        let c = self.queue.counters();
        format!(
            "state {} | batch {} triangles {} fragments {} | free {} fetch {} read {} test {} write {} color {} | last stamp {}",
            self.state,
            self.batches,
            self.triangles,
            self.fragments,
            c.free,
            c.fetch,
            c.read,
            c.test,
            c.write,
            c.color,
            if self.last_fragment { "received" } else { "pending" },
        )
    }

    /// Simulates one cycle of the stage.
    ///
    /// # Errors
    ///
    /// Returns a [`ZStencilError`] when a neighbor violates the command, stamp or
    /// signal protocol. The stage must not be clocked again afterwards.
    pub fn clock(&mut self, cycle: u64) -> Result<(), ZStencilError> {
        self.stats.cycles += 1;

        while let Some(txn) = self.ports.memory_data.read(cycle) {
            match txn {
                MemoryTransaction::State(state) => self.memory_state = state,
                other => self.cache.process_memory_transaction(other),
            }
        }

        let memory_txn = self.cache.update(cycle, self.memory_state);

        if self.config.hz_enabled() {
            if let Some(update) = self.cache.update_hz() {
                trace!(cycle, block = update.block, z = update.z, "ZStencilTest HZ update");
                self.ports.hz_update.write(cycle, update)?;
                self.stats.hz_updates += 1;
            }
        }

        let memory_issued = memory_txn.is_some();
        if let Some(txn) = memory_txn {
            match &txn {
                MemoryTransaction::ReadRequest { size, .. } => {
                    self.stats.read_trans += 1;
                    self.stats.read_bytes += *size as u64;
                }
                MemoryTransaction::WriteData { data, .. } => {
                    self.stats.write_trans += 1;
                    self.stats.write_bytes += data.len() as u64;
                }
                _ => {}
            }
            self.ports.memory_request.write(cycle, txn)?;
        }

        if let Some(status) = self.ports.ffifo_state.read(cycle) {
            self.ffifo_status = status;
        }
        if let Some(status) = self.ports.color_state.read(cycle) {
            self.color_status = status;
        }

        match self.state {
            RasterizerState::Reset => self.reset(),
            RasterizerState::Ready | RasterizerState::End => {
                if let Some(command) = self.ports.command.read(cycle) {
                    self.process_command(command, cycle)?;
                }
            }
            RasterizerState::Drawing => self.draw(cycle, memory_issued)?,
            RasterizerState::Swap => {
                if self.cache.flush() {
                    debug!(cycle, frame = self.frames, "ZStencilTest buffer flushed");
                    self.state = RasterizerState::End;
                }
            }
            RasterizerState::Clear => {
                let depth = self.registers.clear_depth;
                let stencil = self.registers.clear_stencil;
                if self.cache.clear(depth, stencil) == ClearStatus::Done {
                    debug!(cycle, "ZStencilTest clear finished");
                    self.state = RasterizerState::End;
                }
            }
        }

        let reserve = self.config.upstream_reserve_cycles * self.config.stamps_cycle;
        let upstream = if self.queue.counters().free >= reserve {
            UnitStatus::Ready
        } else {
            UnitStatus::Busy
        };
        self.ports.upstream_state.write(cycle, upstream)?;
        self.ports.state.write(cycle, self.state)?;
        Ok(())
    }

    fn reset(&mut self) {
        debug!("ZStencilTest reset");
        self.cache.reset();
        self.registers = ZStencilRegisters::default();
        self.cache.swap(self.registers.zstencil_buffer);
        self.evaluator.configure(DepthStencilState::from(&self.registers));
        self.queue.reset();
        self.test_cycles = 0;
        self.last_fragment = false;
        self.state = RasterizerState::Ready;
    }

    fn require(&self, command: &RasterizerCommand, required: RasterizerState) -> Result<(), ZStencilError> {
        if self.state == required {
            Ok(())
        } else {
            Err(ZStencilError::CommandInWrongState {
                command: command.name(),
                required,
                current: self.state,
            })
        }
    }

    fn process_command(&mut self, command: RasterizerCommand, cycle: u64) -> Result<(), ZStencilError> {
        debug!(cycle, command = command.name(), state = %self.state, "ZStencilTest command");

        match command {
            RasterizerCommand::Reset => self.state = RasterizerState::Reset,
            RasterizerCommand::Draw => {
                self.require(&command, RasterizerState::Ready)?;
                self.evaluator.configure(DepthStencilState::from(&self.registers));
                self.queue.reset();
                self.triangles = 0;
                self.fragments = 0;
                self.current_triangle = None;
                self.last_fragment = false;
                self.destination = if self.registers.early_z {
                    Destination::FragmentFifo
                } else {
                    Destination::ColorWrite
                };
                self.batches += 1;
                self.state = RasterizerState::Drawing;
            }
            RasterizerCommand::End => {
                self.require(&command, RasterizerState::End)?;
                self.state = RasterizerState::Ready;
            }
            RasterizerCommand::RegisterWrite { register, value, .. } => {
                self.require(&command, RasterizerState::Ready)?;
                if let (GpuRegister::ZStencilBufferAddr, RegisterValue::Uint(address)) = (register, value) {
                    let alignment = self.config.stamp_bytes();
                    if address as usize % alignment != 0 {
                        return Err(ZStencilError::UnalignedBufferAddress { address, alignment });
                    }
                }
                self.registers.write(register, value)?;
                if register == GpuRegister::ZStencilBufferAddr {
                    self.cache.swap(self.registers.zstencil_buffer);
                }
            }
            RasterizerCommand::Swap => {
                self.require(&command, RasterizerState::Ready)?;
                self.frames += 1;
                self.state = RasterizerState::Swap;
            }
            RasterizerCommand::Clear => {
                self.require(&command, RasterizerState::Ready)?;
                let status = self
                    .cache
                    .clear(self.registers.clear_depth, self.registers.clear_stencil);
                self.state = if status == ClearStatus::Done {
                    debug!(cycle, "ZStencilTest clear finished");
                    RasterizerState::End
                } else {
                    RasterizerState::Clear
                };
            }
        }
        Ok(())
    }

    fn draw(&mut self, cycle: u64, memory_issued: bool) -> Result<(), ZStencilError> {
        self.ingest(cycle)?;
        self.fetch(cycle);
        self.test_cycles = self.test_cycles.saturating_sub(1);
        self.read(cycle)?;
        self.complete_test(cycle)?;
        self.write(cycle);

        if self.last_fragment
            && self.queue.is_empty()
            && !memory_issued
            && !self.cache.has_pending_requests()
        {
            if let Some(stamp) = self.queue.take_end_of_batch() {
                debug!(cycle, destination = ?self.destination, "ZStencilTest sending last stamp");
                self.send(cycle, stamp)?;
            }
            self.state = RasterizerState::End;
            return Ok(());
        }

        self.output(cycle)
    }

    fn ingest(&mut self, cycle: u64) -> Result<(), ZStencilError> {
        if self.queue.counters().free < self.config.stamps_cycle {
            return Ok(());
        }

        for _ in 0..self.config.stamps_cycle {
            let mut stamp: Stamp = Vec::with_capacity(self.group);
            while stamp.len() < self.group {
                let Some(sample) = self.ports.fragments.read(cycle) else {
                    break;
                };
                stamp.push(sample);
            }
            if stamp.is_empty() {
                break;
            }
            if stamp.len() < self.group {
                return Err(ZStencilError::IncompleteStamp {
                    received: stamp.len(),
                    expected: self.group,
                });
            }

            for sample in &stamp {
                if self.current_triangle != Some(sample.triangle_id) {
                    self.current_triangle = Some(sample.triangle_id);
                    self.triangles += 1;
                }
                self.fragments += 1;
            }
            self.stats.inputs += self.group as u64;

            self.process_stamp(stamp, cycle)?;
        }
        Ok(())
    }

    fn process_stamp(&mut self, stamp: Stamp, cycle: u64) -> Result<(), ZStencilError> {
        if self.last_fragment {
            return Err(ZStencilError::StampAfterEndOfBatch);
        }

        let Some(first) = stamp.first().and_then(|s| s.fragment) else {
            if let Some(sample) = stamp.iter().position(|s| !s.is_end_of_batch()) {
                return Err(ZStencilError::MixedSentinelStamp { sample });
            }
            debug!(cycle, "ZStencilTest received last stamp");
            self.last_fragment = true;
            self.queue.store_end_of_batch(stamp);
            return Ok(());
        };

        let regs = &self.registers;
        let address = self
            .config
            .tiling
            .pixel_to_memory(first.x, first.y, regs.x_res, self.config.bytes_pixel as u32)
            .wrapping_add(regs.zstencil_buffer);

        let mut in_depth = vec![0; self.group];
        let mut culled = vec![true; self.group];
        for (i, sample) in stamp.iter().enumerate() {
            let Some(fragment) = sample.fragment else {
                return Err(ZStencilError::MixedSentinelStamp { sample: i });
            };
            culled[i] = sample.culled;
            in_depth[i] = if sample.culled {
                self.stats.outside += 1;
                fragment.z
            } else if regs.modify_depth {
                sample
                    .attributes
                    .get(POSITION_ATTRIBUTE)
                    .map_or(fragment.z, |position| self.evaluator.convert_z(position[3]))
            } else {
                fragment.z
            };
        }

        if culled.iter().all(|&c| c) {
            trace!(cycle, address = format_args!("{address:#x}"), "ZStencilTest culled whole stamp");
            self.stats.culled += self.group as u64;
            return Ok(());
        }

        trace!(cycle, x = first.x, y = first.y, address = format_args!("{address:#x}"), "ZStencilTest stamp queued");
        self.queue.allocate(address, &in_depth, &culled, stamp, cycle);
        Ok(())
    }

    fn fetch(&mut self, cycle: u64) {
        let Some(address) = self.queue.fetch_candidate(cycle).map(|(_, e)| e.address) else {
            return;
        };

        if !self.registers.test_enabled() {
            trace!(cycle, "ZStencilTest bypassing stamp");
            self.queue.bypass(cycle);
            return;
        }

        match self.cache.fetch(address) {
            Ok(slot) => {
                trace!(cycle, address = format_args!("{address:#x}"), way = slot.way, line = slot.line, "ZStencilTest fetched");
                self.queue.complete_fetch(slot, cycle);
                self.stats.fetch_ok += 1;
            }
            Err(_) => self.stats.fetch_fail += 1,
        }
    }

    fn read(&mut self, cycle: u64) -> Result<(), ZStencilError> {
        if !self.registers.test_enabled() || self.test_cycles > 0 {
            return Ok(());
        }
        let Some((address, slot)) = self.queue.read_candidate(cycle).map(|(_, e)| (e.address, e.slot)) else {
            return Ok(());
        };

        if self.queue.has_read_after_write_hazard() {
            trace!(cycle, address = format_args!("{address:#x}"), "ZStencilTest read before write");
            self.stats.raw_dep += 1;
            return Ok(());
        }

        let target = self.queue.read_target();
        if self.cache.read(address, slot, &mut target.buffer).is_err() {
            self.stats.read_fail += 1;
            return Ok(());
        }

        let entry = self.queue.complete_read(cycle);
        trace!(cycle, address = format_args!("{address:#x}"), entry, "ZStencilTest test issued");
        self.ports.test_start.write(cycle, ZOperation { entry })?;
        self.test_cycles = self.config.test_rate;
        self.stats.read_ok += 1;
        Ok(())
    }

    fn complete_test(&mut self, cycle: u64) -> Result<(), ZStencilError> {
        let Some(op) = self.ports.test_end.read(cycle) else {
            return Ok(());
        };
        let entry = match self.queue.entry_mut(op.entry) {
            Some(entry) if entry.phase == EntryPhase::InTest => entry,
            _ => return Err(ZStencilError::OrphanTestOperation { entry: op.entry }),
        };

        self.evaluator
            .stencil_z_test(&entry.in_depth, &mut entry.buffer, &mut entry.culled);

        let failed = entry.culled.iter().filter(|&&c| c).count() as u64;
        self.stats.tested += self.group as u64;
        self.stats.failed += failed;
        self.stats.passed += self.group as u64 - failed;

        self.queue.complete_test(op.entry, cycle);
        trace!(cycle, entry = op.entry, failed, "ZStencilTest test completed");
        Ok(())
    }

    fn write(&mut self, cycle: u64) {
        let Some((_, entry)) = self.queue.write_candidate(cycle) else {
            return;
        };
        let address = entry.address;
        if self.cache.write(address, entry.slot, &entry.buffer).is_ok() {
            trace!(cycle, address = format_args!("{address:#x}"), "ZStencilTest written");
            self.queue.complete_write(cycle);
            self.stats.write_ok += 1;
        } else {
            self.stats.write_fail += 1;
        }
    }

    fn output(&mut self, cycle: u64) -> Result<(), ZStencilError> {
        let status = match self.destination {
            Destination::FragmentFifo => self.ffifo_status,
            Destination::ColorWrite => self.color_status,
        };
        if status != UnitStatus::Ready || !self.queue.output_ready(cycle) {
            return Ok(());
        }
        let Some((stamp, culled)) = self.queue.release() else {
            return Ok(());
        };

        let stamp = stamp
            .into_iter()
            .zip(culled)
            .map(|(sample, cull)| FragmentInput { culled: cull, ..sample })
            .collect();
        self.send(cycle, stamp)
    }

    fn send(&mut self, cycle: u64, stamp: Stamp) -> Result<(), ZStencilError> {
        let signal: &SignalTx<FragmentInput> = match self.destination {
            Destination::FragmentFifo => &self.ports.ffifo_output,
            Destination::ColorWrite => &self.ports.color_output,
        };
        for sample in stamp {
            signal.write(cycle, sample)?;
            self.stats.outputs += 1;
        }
        Ok(())
    }
}
