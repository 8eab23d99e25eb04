//! Signal wiring of the Z/stencil stage.
//!
//! [`wire`] creates every signal of the stage and splits them into the ends the
//! stage owns ([`ZStencilPorts`]) and the ends its neighbors own ([`ZStencilPeers`]).

use super::command::{RasterizerCommand, RasterizerState, UnitStatus};
use super::fragment::FragmentInput;
use crate::cache::HzUpdate;
use crate::config::ZStencilConfig;
use crate::memory::MemoryTransaction;
use crate::signal::{SignalRx, SignalTx, signal};

/// Token that travels through the test pipeline, naming the queue entry under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZOperation {
    /// Queue entry being tested.
    pub entry: usize,
}

/// Signal ends owned by the Z/stencil stage.
#[derive(Debug)]
pub struct ZStencilPorts {
    /// Commands from the command processor.
    pub command: SignalRx<RasterizerCommand>,
    /// Pipeline state to the command processor.
    pub state: SignalTx<RasterizerState>,
    /// Stamps from the upstream unit.
    pub fragments: SignalRx<FragmentInput>,
    /// Stamps to the fragment FIFO (early test).
    pub ffifo_output: SignalTx<FragmentInput>,
    /// Stamps to color write (late test).
    pub color_output: SignalTx<FragmentInput>,
    /// Flow control from the fragment FIFO.
    pub ffifo_state: SignalRx<UnitStatus>,
    /// Flow control from color write.
    pub color_state: SignalRx<UnitStatus>,
    /// Flow control to the upstream unit.
    pub upstream_state: SignalTx<UnitStatus>,
    /// Requests to the memory controller.
    pub memory_request: SignalTx<MemoryTransaction>,
    /// Data and accept state from the memory controller.
    pub memory_data: SignalRx<MemoryTransaction>,
    /// Start of the test pipeline.
    pub test_start: SignalTx<ZOperation>,
    /// End of the test pipeline.
    pub test_end: SignalRx<ZOperation>,
    /// Updates to the hierarchical Z buffer.
    pub hz_update: SignalTx<HzUpdate>,
}

/// Signal ends owned by the neighbors of the Z/stencil stage.
#[derive(Debug)]
pub struct ZStencilPeers {
    /// Commands to the stage.
    pub command: SignalTx<RasterizerCommand>,
    /// Pipeline state of the stage.
    pub state: SignalRx<RasterizerState>,
    /// Stamps into the stage.
    pub fragments: SignalTx<FragmentInput>,
    /// Stamps sent to the fragment FIFO.
    pub ffifo_output: SignalRx<FragmentInput>,
    /// Stamps sent to color write.
    pub color_output: SignalRx<FragmentInput>,
    /// Fragment FIFO flow control.
    pub ffifo_state: SignalTx<UnitStatus>,
    /// Color write flow control.
    pub color_state: SignalTx<UnitStatus>,
    /// Flow control of the stage towards the upstream unit.
    pub upstream_state: SignalRx<UnitStatus>,
    /// Requests issued by the stage's cache.
    pub memory_request: SignalRx<MemoryTransaction>,
    /// Memory data and state into the stage.
    pub memory_data: SignalTx<MemoryTransaction>,
    /// Hierarchical Z updates from the stage.
    pub hz_update: SignalRx<HzUpdate>,
}

/// Creates the signals of a Z/stencil stage.
///
/// # Arguments
///
/// * `config` - Stage parameters; sets stamp bandwidth and test and HZ latencies.
///
/// # Returns
///
/// The stage's ends and its neighbors' ends.
pub fn wire(config: &ZStencilConfig) -> (ZStencilPorts, ZStencilPeers) {
    let stamp_bandwidth = config.stamps_cycle * config.group_size();

    let (command_tx, command_rx) = signal("ZStencilCommand", 1, 1);
    let (state_tx, state_rx) = signal("ZStencilRasterizerState", 1, 1);
    let (fragments_tx, fragments_rx) = signal("ZStencilInput", stamp_bandwidth, 1);
    let (ffifo_tx, ffifo_rx) = signal("ZStencilFFIFOOutput", stamp_bandwidth, 1);
    let (color_tx, color_rx) = signal("ZStencilColorWriteOutput", stamp_bandwidth, 1);
    let (ffifo_state_tx, ffifo_state_rx) = signal("FFIFOState", 1, 1);
    let (color_state_tx, color_state_rx) = signal("ColorWriteState", 1, 1);
    let (upstream_tx, upstream_rx) = signal("ZStencilTestState", 1, 1);
    let (request_tx, request_rx) = signal("ZStencilTestMemoryRequest", 1, 1);
    let (data_tx, data_rx) = signal("ZStencilTestMemoryData", 2, 1);
    let (test_tx, test_rx) = signal("ZStencilTest", 1, config.test_latency);
    let (hz_tx, hz_rx) = signal("HZUpdate", 1, config.hz_update_latency);

    (
        ZStencilPorts {
            command: command_rx,
            state: state_tx,
            fragments: fragments_rx,
            ffifo_output: ffifo_tx,
            color_output: color_tx,
            ffifo_state: ffifo_state_rx,
            color_state: color_state_rx,
            upstream_state: upstream_tx,
            memory_request: request_tx,
            memory_data: data_rx,
            test_start: test_tx,
            test_end: test_rx,
            hz_update: hz_tx,
        },
        ZStencilPeers {
            command: command_tx,
            state: state_rx,
            fragments: fragments_tx,
            ffifo_output: ffifo_rx,
            color_output: color_rx,
            ffifo_state: ffifo_state_tx,
            color_state: color_state_tx,
            upstream_state: upstream_rx,
            memory_request: request_rx,
            memory_data: data_tx,
            hz_update: hz_rx,
        },
    )
}
