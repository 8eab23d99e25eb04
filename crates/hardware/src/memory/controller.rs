//! Fixed-latency video memory controller.
//!
//! Every read request is answered after the same number of cycles; write data is
//! stored as soon as it arrives. The controller stops accepting reads while too
//! many are outstanding and reports its accept state on every cycle.

use std::collections::VecDeque;

use tracing::{trace, warn};

use super::{MemoryState, MemoryTransaction};
use crate::config::MemoryConfig;
use crate::signal::{SignalError, SignalRx, SignalTx};

/// Video memory backing store and timing model.
#[derive(Debug)]
pub struct VideoMemory {
    data: Vec<u8>,
    latency: u64,
    max_pending_reads: usize,
    /// Read replies waiting for their due cycle.
    pending: VecDeque<(u64, u32, Vec<u8>)>,
    requests: SignalRx<MemoryTransaction>,
    replies: SignalTx<MemoryTransaction>,
    /// Read requests served.
    pub reads: u64,
    /// Write transactions stored.
    pub writes: u64,
}

impl VideoMemory {
    /// Creates the memory model.
    ///
    /// # Arguments
    ///
    /// * `config` - Size and timing parameters.
    /// * `requests` - Consumer end of the client's request signal.
    /// * `replies` - Producer end of the client's data signal.
    pub fn new(
        config: &MemoryConfig,
        requests: SignalRx<MemoryTransaction>,
        replies: SignalTx<MemoryTransaction>,
    ) -> Self {
        Self {
            data: vec![0; config.size],
            latency: config.latency,
            max_pending_reads: config.max_pending_reads,
            pending: VecDeque::new(),
            requests,
            replies,
            reads: 0,
            writes: 0,
        }
    }

    /// Simulates one cycle: accept a request, answer at most one due read and
    /// publish the accept state.
    ///
    /// # Errors
    ///
    /// Propagates bandwidth violations on the data signal.
    pub fn clock(&mut self, cycle: u64) -> Result<(), SignalError> {
        if let Some(txn) = self.requests.read(cycle) {
            match txn {
                MemoryTransaction::ReadRequest { ticket, address, size } => {
                    trace!(cycle, ticket, address = format_args!("{address:#x}"), size, "memory read");
                    let bytes = self.read_bytes(address, size);
                    self.pending.push_back((cycle + self.latency, ticket, bytes));
                    self.reads += 1;
                }
                MemoryTransaction::WriteData { address, data } => {
                    trace!(cycle, address = format_args!("{address:#x}"), size = data.len(), "memory write");
                    self.write_bytes(address, &data);
                    self.writes += 1;
                }
                other => warn!(cycle, ?other, "unexpected transaction sent to memory"),
            }
        }

        if self.pending.front().is_some_and(|&(due, _, _)| due <= cycle) {
            if let Some((_, ticket, data)) = self.pending.pop_front() {
                self.replies.write(cycle, MemoryTransaction::ReadData { ticket, data })?;
            }
        }

        let state = if self.pending.len() < self.max_pending_reads {
            MemoryState::Both
        } else {
            MemoryState::WriteAccept
        };
        self.replies.write(cycle, MemoryTransaction::State(state))
    }

    /// Copies bytes out of memory; bytes past the end read as zero.
    pub fn read_bytes(&self, address: u32, size: usize) -> Vec<u8> {
        let start = address as usize;
        let mut out = vec![0; size];
        if start < self.data.len() {
            let end = (start + size).min(self.data.len());
            out[..end - start].copy_from_slice(&self.data[start..end]);
        }
        out
    }

    /// Copies bytes into memory; bytes past the end are dropped.
    pub fn write_bytes(&mut self, address: u32, bytes: &[u8]) {
        let start = address as usize;
        if start >= self.data.len() {
            warn!(address = format_args!("{address:#x}"), "write outside video memory dropped");
            return;
        }
        let end = (start + bytes.len()).min(self.data.len());
        self.data[start..end].copy_from_slice(&bytes[..end - start]);
    }

    /// Reads the 32-bit little-endian word at `address`.
    pub fn read_u32(&self, address: u32) -> u32 {
        let bytes = self.read_bytes(address, 4);
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Number of read replies not yet delivered.
    pub fn pending_reads(&self) -> usize {
        self.pending.len()
    }
}
