//! Set-associative depth/stencil tile cache.
//!
//! Lines hold `stamps_line` consecutive stamps of the tiled buffer. The cache is
//! write-back and write-allocate, and it provides:
//! 1. **Reservation:** A fetched line cannot be evicted until the stamp that
//!    fetched it has been written back into it.
//! 2. **Fast Clear:** A clear only marks every buffer block as cleared; a line of a
//!    cleared block is filled with the clear value instead of being read from memory.
//! 3. **Memory Traffic:** At most one transaction per cycle, write-backs first.
//! 4. **Hierarchical Z:** Each write-back can report the farthest depth of its block.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::policies::{FifoPolicy, LruPolicy, ReplacementPolicy};
use super::{CacheBusy, ClearStatus, HzUpdate, TileCache, TileSlot};
use crate::common::constants::{depth_of, pack_depth_stencil};
use crate::config::{ReplacementPolicy as PolicyType, ZCacheConfig};
use crate::memory::{MemoryState, MemoryTransaction};

/// Cache line holding one block of the buffer.
#[derive(Debug, Clone, Default)]
struct TileLine {
    /// Line number (address / line size).
    tag: u32,
    valid: bool,
    /// Waiting for read data from memory.
    filling: bool,
    dirty: bool,
    /// Stamps that fetched the line and have not written it yet.
    reserves: u32,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct LineRead {
    ticket: u32,
    address: u32,
    index: usize,
}

#[derive(Debug)]
struct WriteBack {
    address: u32,
    data: Vec<u8>,
    hz: Option<HzUpdate>,
}

/// Traffic counters of a [`ZCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZCacheStats {
    /// Fetches that found their line.
    pub hits: u64,
    /// Fetches that allocated a line.
    pub misses: u64,
    /// Misses served from the cleared block state without a memory read.
    pub clear_fills: u64,
    /// Line reads sent to memory.
    pub line_reads: u64,
    /// Line write-backs sent to memory.
    pub write_backs: u64,
    /// Clears started.
    pub clears: u64,
}

/// Depth/stencil tile cache.
#[derive(Debug)]
pub struct ZCache {
    ways: usize,
    sets: usize,
    line_bytes: usize,
    lines: Vec<TileLine>,
    policy: Box<dyn ReplacementPolicy>,
    read_ports: usize,
    write_ports: usize,
    reads_left: usize,
    writes_left: usize,
    request_queue: usize,
    read_requests: VecDeque<LineRead>,
    outstanding: Vec<LineRead>,
    write_backs: VecDeque<WriteBack>,
    hz_updates: VecDeque<HzUpdate>,
    next_ticket: u32,
    base: u32,
    /// Per block clear flag, indexed by line-sized block relative to `base`.
    cleared: Vec<bool>,
    clear_word: u32,
    clear_remaining: Option<usize>,
    blocks_cycle: usize,
    hz_enabled: bool,
    stats: ZCacheStats,
}

impl ZCache {
    /// Creates a tile cache.
    ///
    /// # Arguments
    ///
    /// * `config` - Geometry, ports, queues and replacement policy.
    /// * `stamp_bytes` - Bytes of one stamp; a line holds `config.stamps_line` of them.
    /// * `hz_enabled` - Produce hierarchical Z updates on write-back.
    pub fn new(config: &ZCacheConfig, stamp_bytes: usize, hz_enabled: bool) -> Self {
        let ways = config.ways.max(1);
        let sets = config.lines.max(1);
        let line_bytes = (config.stamps_line * stamp_bytes).max(1);

        let policy: Box<dyn ReplacementPolicy> = match config.policy {
            PolicyType::Lru => Box::new(LruPolicy::new(sets, ways)),
            PolicyType::Fifo => Box::new(FifoPolicy::new(sets, ways)),
        };

        Self {
            ways,
            sets,
            line_bytes,
            lines: vec![
                TileLine {
                    data: vec![0; line_bytes],
                    ..TileLine::default()
                };
                sets * ways
            ],
            policy,
            read_ports: config.read_ports,
            write_ports: config.write_ports,
            reads_left: config.read_ports,
            writes_left: config.write_ports,
            request_queue: config.request_queue.max(1),
            read_requests: VecDeque::new(),
            outstanding: Vec::new(),
            write_backs: VecDeque::new(),
            hz_updates: VecDeque::new(),
            next_ticket: 0,
            base: 0,
            cleared: vec![false; config.max_blocks],
            clear_word: 0,
            clear_remaining: None,
            blocks_cycle: config.blocks_cycle.max(1),
            hz_enabled,
            stats: ZCacheStats::default(),
        }
    }

    /// Bytes per cache line.
    #[inline]
    pub const fn line_bytes(&self) -> usize {
        self.line_bytes
    }

    /// Traffic counters.
    #[inline]
    pub const fn stats(&self) -> ZCacheStats {
        self.stats
    }

    /// Returns true if the line covering `address` is present and dirty.
    pub fn is_dirty(&self, address: u32) -> bool {
        let tag = self.tag_of(address);
        let set = tag as usize % self.sets;
        self.lines[set * self.ways..(set + 1) * self.ways]
            .iter()
            .any(|l| l.valid && l.tag == tag && l.dirty)
    }

    #[inline]
    fn tag_of(&self, address: u32) -> u32 {
        address / self.line_bytes as u32
    }

    #[inline]
    fn slot_index(&self, slot: TileSlot) -> Option<usize> {
        (slot.way < self.ways && slot.line < self.sets).then_some(slot.line * self.ways + slot.way)
    }

    fn block_of(&self, line_address: u32) -> Option<usize> {
        let offset = line_address.checked_sub(self.base)? as usize;
        let block = offset / self.line_bytes;
        (block < self.cleared.len()).then_some(block)
    }

    fn fill_with_clear_value(&mut self, index: usize) {
        let word = self.clear_word.to_le_bytes();
        for chunk in self.lines[index].data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&word);
        }
    }

    fn queue_write_back(&mut self, index: usize) {
        let line = &mut self.lines[index];
        line.dirty = false;
        let address = line.tag * self.line_bytes as u32;
        let data = line.data.clone();

        let block = self.block_of(address);
        if let Some(block) = block {
            self.cleared[block] = false;
        }
        let hz = if self.hz_enabled {
            block.map(|block| HzUpdate {
                block: block as u32,
                z: data
                    .chunks_exact(4)
                    .map(|w| depth_of(u32::from_le_bytes([w[0], w[1], w[2], w[3]])))
                    .max()
                    .unwrap_or(0),
            })
        } else {
            None
        };

        // A block holds at most one queued write-back, carrying its newest data.
        if let Some(queued) = self.write_backs.iter_mut().find(|w| w.address == address) {
            trace!(address = format_args!("{address:#x}"), "ZCache replaced queued write-back");
            queued.data = data;
            queued.hz = hz;
            return;
        }
        trace!(address = format_args!("{address:#x}"), "ZCache queued write-back");
        self.write_backs.push_back(WriteBack { address, data, hz });
    }
}

impl TileCache for ZCache {
    fn fetch(&mut self, address: u32) -> Result<TileSlot, CacheBusy> {
        let tag = self.tag_of(address);
        let set = tag as usize % self.sets;
        let first = set * self.ways;

        let hit = (0..self.ways).find(|&way| {
            let line = &self.lines[first + way];
            (line.valid || line.filling) && line.tag == tag
        });
        if let Some(way) = hit {
            self.lines[first + way].reserves += 1;
            self.policy.update(set, way);
            self.stats.hits += 1;
            return Ok(TileSlot { way, line: set });
        }

        let candidates = &self.lines[first..first + self.ways];
        let way = self
            .policy
            .victim(set, &|way| candidates[way].reserves == 0 && !candidates[way].filling)
            .ok_or(CacheBusy)?;
        let index = first + way;

        let line_address = tag * self.line_bytes as u32;
        let pending_write = self.write_backs.iter().rposition(|w| w.address == line_address);
        let from_clear = self.block_of(line_address).is_some_and(|b| self.cleared[b]);
        let victim_dirty = self.lines[index].valid && self.lines[index].dirty;

        if victim_dirty && self.write_backs.len() >= self.request_queue {
            return Err(CacheBusy);
        }
        let needs_read = pending_write.is_none() && !from_clear;
        if needs_read && self.read_requests.len() + self.outstanding.len() >= self.request_queue {
            return Err(CacheBusy);
        }

        if victim_dirty {
            self.queue_write_back(index);
        }

        {
            let line = &mut self.lines[index];
            line.tag = tag;
            line.dirty = false;
            line.reserves = 1;
            line.valid = !needs_read;
            line.filling = needs_read;
        }

        if let Some(pos) = pending_write {
            // The newest copy of the block is still waiting to reach memory.
            let data = self.write_backs[pos].data.clone();
            self.lines[index].data.copy_from_slice(&data);
        } else if from_clear {
            self.fill_with_clear_value(index);
            self.stats.clear_fills += 1;
        } else {
            let ticket = self.next_ticket;
            self.next_ticket = self.next_ticket.wrapping_add(1);
            self.read_requests.push_back(LineRead {
                ticket,
                address: line_address,
                index,
            });
        }

        self.policy.update(set, way);
        self.stats.misses += 1;
        trace!(
            address = format_args!("{address:#x}"),
            way,
            line = set,
            needs_read,
            "ZCache miss"
        );
        Ok(TileSlot { way, line: set })
    }

    fn read(&mut self, address: u32, slot: TileSlot, out: &mut [u8]) -> Result<(), CacheBusy> {
        if self.reads_left == 0 {
            return Err(CacheBusy);
        }
        let tag = self.tag_of(address);
        let offset = address as usize % self.line_bytes;
        let index = self.slot_index(slot).ok_or(CacheBusy)?;
        let line = &self.lines[index];
        if !line.valid || line.tag != tag {
            return Err(CacheBusy);
        }
        let src = line.data.get(offset..offset + out.len()).ok_or(CacheBusy)?;
        out.copy_from_slice(src);
        self.reads_left -= 1;
        Ok(())
    }

    fn write(&mut self, address: u32, slot: TileSlot, data: &[u8]) -> Result<(), CacheBusy> {
        if self.writes_left == 0 {
            return Err(CacheBusy);
        }
        let tag = self.tag_of(address);
        let offset = address as usize % self.line_bytes;
        let index = self.slot_index(slot).ok_or(CacheBusy)?;
        let line = &mut self.lines[index];
        if !line.valid || line.tag != tag {
            return Err(CacheBusy);
        }
        let dst = line.data.get_mut(offset..offset + data.len()).ok_or(CacheBusy)?;
        dst.copy_from_slice(data);
        line.dirty = true;
        line.reserves = line.reserves.saturating_sub(1);
        self.writes_left -= 1;
        self.policy.update(slot.line, slot.way);
        Ok(())
    }

    fn clear(&mut self, depth: u32, stencil: u8) -> ClearStatus {
        match self.clear_remaining {
            None => {
                for line in &mut self.lines {
                    line.valid = false;
                    line.dirty = false;
                    line.reserves = 0;
                }
                self.write_backs.clear();
                self.cleared.fill(true);
                self.clear_word = pack_depth_stencil(depth, stencil);
                self.clear_remaining = Some(self.cleared.len().div_ceil(self.blocks_cycle));
                self.stats.clears += 1;
                debug!(
                    depth = format_args!("{depth:#x}"),
                    stencil,
                    "ZCache clear started"
                );
                ClearStatus::InProgress
            }
            Some(remaining) => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    self.clear_remaining = None;
                    debug!("ZCache clear finished");
                    ClearStatus::Done
                } else {
                    self.clear_remaining = Some(remaining);
                    ClearStatus::InProgress
                }
            }
        }
    }

    fn swap(&mut self, base: u32) {
        debug!(base = format_args!("{base:#x}"), "ZCache buffer address");
        self.base = base;
    }

    fn flush(&mut self) -> bool {
        for index in 0..self.lines.len() {
            if self.write_backs.len() >= self.request_queue {
                break;
            }
            let line = &self.lines[index];
            if line.valid && line.dirty && line.reserves == 0 {
                self.queue_write_back(index);
            }
        }
        let clean = self.lines.iter().all(|l| !(l.valid && l.dirty));
        clean && !self.has_pending_requests()
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.valid = false;
            line.filling = false;
            line.dirty = false;
            line.reserves = 0;
        }
        self.policy.reset();
        self.read_requests.clear();
        self.outstanding.clear();
        self.write_backs.clear();
        self.hz_updates.clear();
        self.cleared.fill(false);
        self.clear_remaining = None;
        self.reads_left = self.read_ports;
        self.writes_left = self.write_ports;
    }

    fn update(&mut self, cycle: u64, memory: MemoryState) -> Option<MemoryTransaction> {
        self.reads_left = self.read_ports;
        self.writes_left = self.write_ports;

        if memory.accepts_writes() {
            if let Some(write) = self.write_backs.pop_front() {
                trace!(cycle, address = format_args!("{:#x}", write.address), "ZCache write-back");
                self.stats.write_backs += 1;
                if let Some(hz) = write.hz {
                    self.hz_updates.push_back(hz);
                }
                return Some(MemoryTransaction::WriteData {
                    address: write.address,
                    data: write.data,
                });
            }
        }

        if memory.accepts_reads() {
            if let Some(request) = self.read_requests.pop_front() {
                trace!(cycle, address = format_args!("{:#x}", request.address), ticket = request.ticket, "ZCache line read");
                self.stats.line_reads += 1;
                self.outstanding.push(request);
                return Some(MemoryTransaction::ReadRequest {
                    ticket: request.ticket,
                    address: request.address,
                    size: self.line_bytes,
                });
            }
        }

        None
    }

    fn update_hz(&mut self) -> Option<HzUpdate> {
        self.hz_updates.pop_front()
    }

    fn process_memory_transaction(&mut self, transaction: MemoryTransaction) {
        let MemoryTransaction::ReadData { ticket, data } = transaction else {
            return;
        };
        let Some(pos) = self.outstanding.iter().position(|r| r.ticket == ticket) else {
            debug!(ticket, "ZCache dropped read data for an unknown ticket");
            return;
        };
        let request = self.outstanding.swap_remove(pos);
        let line = &mut self.lines[request.index];
        if line.filling && line.tag * self.line_bytes as u32 == request.address {
            let len = data.len().min(line.data.len());
            line.data[..len].copy_from_slice(&data[..len]);
            line.filling = false;
            line.valid = true;
        }
    }

    fn has_pending_requests(&self) -> bool {
        !self.read_requests.is_empty() || !self.outstanding.is_empty() || !self.write_backs.is_empty()
    }
}
