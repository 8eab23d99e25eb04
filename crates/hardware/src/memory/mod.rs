//! Video Memory Interface.
//!
//! This module defines the traffic between the tile cache and video memory. It provides:
//! 1. **Transactions:** Line read requests, read data and write data.
//! 2. **Accept State:** Which kinds of request the memory takes this cycle.
//! 3. **Controller:** A fixed-latency memory model ([`VideoMemory`]) to drive the stage.

/// Fixed-latency video memory model.
pub mod controller;

pub use controller::VideoMemory;

/// Requests the memory controller accepts on the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryState {
    /// No request is accepted.
    #[default]
    None,
    /// Only read requests are accepted.
    ReadAccept,
    /// Only write data is accepted.
    WriteAccept,
    /// Read requests and write data are accepted.
    Both,
}

impl MemoryState {
    /// Returns true if read requests are accepted.
    #[inline]
    pub const fn accepts_reads(self) -> bool {
        matches!(self, Self::ReadAccept | Self::Both)
    }

    /// Returns true if write data is accepted.
    #[inline]
    pub const fn accepts_writes(self) -> bool {
        matches!(self, Self::WriteAccept | Self::Both)
    }
}

/// Transaction exchanged between a memory client and the memory controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryTransaction {
    /// Request for `size` bytes at `address`; answered by a `ReadData` with the same ticket.
    ReadRequest {
        /// Client-chosen identifier of the request.
        ticket: u32,
        /// Byte address.
        address: u32,
        /// Bytes requested.
        size: usize,
    },
    /// Data answering a read request.
    ReadData {
        /// Ticket of the request being answered.
        ticket: u32,
        /// Bytes read.
        data: Vec<u8>,
    },
    /// Bytes to store at `address`.
    WriteData {
        /// Byte address.
        address: u32,
        /// Bytes to write.
        data: Vec<u8>,
    },
    /// Accept state published by the controller every cycle.
    State(MemoryState),
}
