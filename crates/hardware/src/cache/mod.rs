//! Depth/Stencil Tile Cache.
//!
//! This module defines the cache the Z/stencil stage tests against. It provides:
//! 1. **Contract:** The [`TileCache`] trait with non-blocking fetch, read, write,
//!    clear, swap and flush operations plus the per-cycle memory update.
//! 2. **Implementation:** [`ZCache`], a set-associative write-back cache of
//!    framebuffer tiles with fast clear and hierarchical Z update generation.
//! 3. **Replacement:** LRU and FIFO victim selection in [`policies`].
//!
//! Every operation either succeeds immediately or reports that the cache is busy;
//! the caller retries on a later cycle.

/// Tile cache replacement policy implementations (FIFO, LRU).
pub mod policies;

/// Set-associative depth/stencil tile cache.
pub mod zcache;

pub use zcache::ZCache;

use thiserror::Error;

use crate::memory::{MemoryState, MemoryTransaction};

/// Cache line reserved for a stamp by a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileSlot {
    /// Way holding the line.
    pub way: usize,
    /// Set (line index inside the way).
    pub line: usize,
}

/// The cache cannot perform the operation this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tile cache busy")]
pub struct CacheBusy;

/// Progress of a buffer clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearStatus {
    /// The clear needs more cycles.
    InProgress,
    /// The clear has finished.
    Done,
}

/// Hierarchical Z update produced when a line is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HzUpdate {
    /// Buffer block (line-sized region relative to the buffer base).
    pub block: u32,
    /// Farthest depth stored in the block.
    pub z: u32,
}

/// Tile cache as seen by the Z/stencil stage.
///
/// A stamp goes through `fetch` (reserves its line), `read` (copies the stored
/// words out) and `write` (stores the updated words and releases the line).
pub trait TileCache {
    /// Reserves the line holding `address`, starting a fill on a miss.
    ///
    /// # Errors
    ///
    /// Fails when no line can be allocated or a request queue is full.
    fn fetch(&mut self, address: u32) -> Result<TileSlot, CacheBusy>;

    /// Copies the words at `address` from a fetched line.
    ///
    /// # Errors
    ///
    /// Fails while the line is still being filled or no read port is left this cycle.
    fn read(&mut self, address: u32, slot: TileSlot, out: &mut [u8]) -> Result<(), CacheBusy>;

    /// Stores words at `address` into a fetched line and releases the reservation.
    ///
    /// # Errors
    ///
    /// Fails while the line is not available or no write port is left this cycle.
    fn write(&mut self, address: u32, slot: TileSlot, data: &[u8]) -> Result<(), CacheBusy>;

    /// Starts or continues a fast clear of the whole buffer.
    fn clear(&mut self, depth: u32, stencil: u8) -> ClearStatus;

    /// Sets the base address of the buffer being cached.
    fn swap(&mut self, base: u32);

    /// Starts writing back every dirty line.
    ///
    /// Returns true once the cache holds no dirty data and has no memory
    /// traffic pending.
    fn flush(&mut self) -> bool;

    /// Drops all cached state.
    fn reset(&mut self);

    /// Advances the cache one cycle and returns the memory transaction to issue, if any.
    fn update(&mut self, cycle: u64, memory: MemoryState) -> Option<MemoryTransaction>;

    /// Returns the next hierarchical Z update, if any.
    fn update_hz(&mut self) -> Option<HzUpdate>;

    /// Delivers a transaction received from memory.
    fn process_memory_transaction(&mut self, transaction: MemoryTransaction);

    /// Returns true while memory requests are queued or outstanding.
    fn has_pending_requests(&self) -> bool;
}
