//! Stamp Queue for in-flight depth/stencil tests.
//!
//! Stamps stay in a fixed ring from ingestion until they are sent downstream. The
//! queue tracks each stamp through its stages and provides:
//! 1. **Allocation:** Store an incoming stamp at the free pointer.
//! 2. **Stage Pointers:** Fetch, read, write and output pointers that each walk the
//!    ring in order, so stamps leave in the order they arrived.
//! 3. **Hazard Scan:** Detect a read of a buffer address that an older stamp has
//!    read but not yet written back.
//! 4. **Release:** Move the stamp payload out of the oldest finished entry.
//!
//! An entry advances at most one stage per cycle.

use super::fragment::Stamp;
use crate::cache::TileSlot;

/// Stage of a queue entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EntryPhase {
    /// Slot unused.
    #[default]
    Free,
    /// Waiting for the cache to reserve its line.
    FetchPending,
    /// Line reserved, waiting to read the stored words.
    ReadPending,
    /// Test operation in flight.
    InTest,
    /// Tested, waiting to write the updated words.
    WritePending,
    /// Finished, waiting to be sent downstream.
    AwaitingOutput,
}

/// A stamp in the queue.
#[derive(Clone, Debug, Default)]
pub struct QueueEntry {
    /// Buffer address of the stamp.
    pub address: u32,
    /// Cache line reserved by the fetch.
    pub slot: TileSlot,
    /// Incoming depth per sample.
    pub in_depth: Vec<u32>,
    /// Cull flag per sample.
    pub culled: Vec<bool>,
    /// Stored buffer words read from the cache, four bytes per sample.
    pub buffer: Vec<u8>,
    /// Stamp payload, taken when the stamp is sent downstream.
    pub stamp: Option<Stamp>,
    /// End-of-batch stamp.
    pub last_stamp: bool,
    /// Current stage.
    pub phase: EntryPhase,
    /// Cycle of the last stage change.
    pub advanced_at: Option<u64>,
}

impl QueueEntry {
    /// Returns true if the entry has not moved yet this cycle.
    #[inline]
    pub fn can_advance(&self, cycle: u64) -> bool {
        self.advanced_at != Some(cycle)
    }

    fn advance(&mut self, phase: EntryPhase, cycle: u64) {
        self.phase = phase;
        self.advanced_at = Some(cycle);
    }
}

/// Number of entries in each stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueCounters {
    /// Unused entries.
    pub free: usize,
    /// Entries waiting for a fetch.
    pub fetch: usize,
    /// Entries waiting for a read.
    pub read: usize,
    /// Entries with a test in flight.
    pub test: usize,
    /// Entries waiting for a write.
    pub write: usize,
    /// Entries waiting to be sent downstream.
    pub color: usize,
}

impl QueueCounters {
    /// Sum over all stages; always equals the queue capacity.
    #[inline]
    pub const fn total(&self) -> usize {
        self.free + self.fetch + self.read + self.test + self.write + self.color
    }
}

/// Ring of in-flight stamps.
#[derive(Debug)]
pub struct StampQueue {
    entries: Vec<QueueEntry>,
    free_ptr: usize,
    fetch_ptr: usize,
    read_ptr: usize,
    write_ptr: usize,
    color_ptr: usize,
    counters: QueueCounters,
}

impl StampQueue {
    /// Creates a queue with `capacity` entries for stamps of `samples` samples.
    pub fn new(capacity: usize, samples: usize) -> Self {
        let entry = QueueEntry {
            in_depth: vec![0; samples],
            culled: vec![true; samples],
            buffer: vec![0; samples * 4],
            ..QueueEntry::default()
        };
        Self {
            entries: vec![entry; capacity],
            free_ptr: 0,
            fetch_ptr: 0,
            read_ptr: 0,
            write_ptr: 0,
            color_ptr: 0,
            counters: QueueCounters {
                free: capacity,
                ..QueueCounters::default()
            },
        }
    }

    /// Returns the capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns the stage counters.
    #[inline]
    pub const fn counters(&self) -> QueueCounters {
        self.counters
    }

    /// Returns true if no stamp is in flight.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counters.free == self.entries.len()
    }

    /// Empties the queue and rewinds every pointer.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.stamp = None;
            entry.last_stamp = false;
            entry.phase = EntryPhase::Free;
            entry.advanced_at = None;
        }
        self.free_ptr = 0;
        self.fetch_ptr = 0;
        self.read_ptr = 0;
        self.write_ptr = 0;
        self.color_ptr = 0;
        self.counters = QueueCounters {
            free: self.entries.len(),
            ..QueueCounters::default()
        };
    }

    #[inline]
    fn next(&self, index: usize) -> usize {
        (index + 1) % self.entries.len()
    }

    /// Mutable entry at a ring index.
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut QueueEntry> {
        self.entries.get_mut(index)
    }

    /// Stores a stamp at the free pointer and queues it for fetch.
    ///
    /// The caller must check that a free entry exists.
    pub fn allocate(&mut self, address: u32, in_depth: &[u32], culled: &[bool], stamp: Stamp, cycle: u64) {
        let index = self.free_ptr;
        let entry = &mut self.entries[index];
        entry.address = address;
        entry.in_depth.copy_from_slice(in_depth);
        entry.culled.copy_from_slice(culled);
        entry.stamp = Some(stamp);
        entry.last_stamp = false;
        entry.advance(EntryPhase::FetchPending, cycle);

        self.free_ptr = self.next(index);
        self.counters.free -= 1;
        self.counters.fetch += 1;
    }

    /// Stores the end-of-batch stamp at the free pointer without consuming the entry.
    ///
    /// The entry is only sent once every other stamp has left the queue, at which
    /// point the output pointer has caught up with it.
    pub fn store_end_of_batch(&mut self, stamp: Stamp) {
        let entry = &mut self.entries[self.free_ptr];
        entry.stamp = Some(stamp);
        entry.last_stamp = true;
    }

    /// Takes the end-of-batch stamp, which sits at the output pointer once the queue is empty.
    pub fn take_end_of_batch(&mut self) -> Option<Stamp> {
        let entry = &mut self.entries[self.color_ptr];
        if !entry.last_stamp {
            return None;
        }
        entry.last_stamp = false;
        entry.stamp.take()
    }

    /// Entry waiting for a fetch, if it may advance this cycle.
    pub fn fetch_candidate(&self, cycle: u64) -> Option<(usize, &QueueEntry)> {
        let entry = &self.entries[self.fetch_ptr];
        (self.counters.fetch > 0 && entry.can_advance(cycle)).then_some((self.fetch_ptr, entry))
    }

    /// Records a successful fetch of the entry at the fetch pointer.
    pub fn complete_fetch(&mut self, slot: TileSlot, cycle: u64) {
        let index = self.fetch_ptr;
        let entry = &mut self.entries[index];
        entry.slot = slot;
        entry.advance(EntryPhase::ReadPending, cycle);
        self.fetch_ptr = self.next(index);
        self.counters.fetch -= 1;
        self.counters.read += 1;
    }

    /// Sends the entry at the fetch pointer straight to output (tests disabled).
    pub fn bypass(&mut self, cycle: u64) {
        let index = self.fetch_ptr;
        self.entries[index].advance(EntryPhase::AwaitingOutput, cycle);
        self.fetch_ptr = self.next(index);
        self.counters.fetch -= 1;
        self.counters.color += 1;
    }

    /// Entry waiting for a read, if it may advance this cycle.
    pub fn read_candidate(&self, cycle: u64) -> Option<(usize, &QueueEntry)> {
        let entry = &self.entries[self.read_ptr];
        (self.counters.read > 0 && entry.can_advance(cycle)).then_some((self.read_ptr, entry))
    }

    /// Returns true if an older entry that has been read but not yet written
    /// covers the same address as the entry at the read pointer.
    pub fn has_read_after_write_hazard(&self) -> bool {
        let address = self.entries[self.read_ptr].address;
        let mut index = self.write_ptr;
        while index != self.read_ptr {
            if self.entries[index].address == address {
                return true;
            }
            index = self.next(index);
        }
        false
    }

    /// Mutable access to the read buffer of the entry at the read pointer.
    pub fn read_target(&mut self) -> &mut QueueEntry {
        &mut self.entries[self.read_ptr]
    }

    /// Records a successful read of the entry at the read pointer; returns its index.
    pub fn complete_read(&mut self, cycle: u64) -> usize {
        let index = self.read_ptr;
        self.entries[index].advance(EntryPhase::InTest, cycle);
        self.read_ptr = self.next(index);
        self.counters.read -= 1;
        self.counters.test += 1;
        index
    }

    /// Records the end of the test of entry `index`.
    ///
    /// The caller checks that the entry has a test in flight; any other
    /// entry is left untouched.
    pub fn complete_test(&mut self, index: usize, cycle: u64) {
        if let Some(entry) = self.entries.get_mut(index).filter(|e| e.phase == EntryPhase::InTest) {
            entry.advance(EntryPhase::WritePending, cycle);
            self.counters.test -= 1;
            self.counters.write += 1;
        }
    }

    /// Entry at the write pointer, if tested and allowed to advance this cycle.
    pub fn write_candidate(&self, cycle: u64) -> Option<(usize, &QueueEntry)> {
        let entry = &self.entries[self.write_ptr];
        (self.counters.write > 0 && entry.phase == EntryPhase::WritePending && entry.can_advance(cycle))
            .then_some((self.write_ptr, entry))
    }

    /// Records a successful write of the entry at the write pointer.
    pub fn complete_write(&mut self, cycle: u64) {
        let index = self.write_ptr;
        self.entries[index].advance(EntryPhase::AwaitingOutput, cycle);
        self.write_ptr = self.next(index);
        self.counters.write -= 1;
        self.counters.color += 1;
    }

    /// Returns true if the oldest entry is finished and may leave this cycle.
    pub fn output_ready(&self, cycle: u64) -> bool {
        let entry = &self.entries[self.color_ptr];
        self.counters.color > 0 && entry.phase == EntryPhase::AwaitingOutput && entry.can_advance(cycle)
    }

    /// Frees the oldest entry and returns its stamp and final cull flags.
    pub fn release(&mut self) -> Option<(Stamp, Vec<bool>)> {
        if self.counters.color == 0 {
            return None;
        }
        let index = self.color_ptr;
        let entry = &mut self.entries[index];
        if entry.phase != EntryPhase::AwaitingOutput {
            return None;
        }
        let stamp = entry.stamp.take()?;
        entry.phase = EntryPhase::Free;
        entry.advanced_at = None;
        let culled = entry.culled.clone();

        self.color_ptr = self.next(index);
        self.counters.color -= 1;
        self.counters.free += 1;
        Some((stamp, culled))
    }
}
