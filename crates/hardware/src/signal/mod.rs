//! Inter-Unit Signals.
//!
//! A signal is the only way two simulated units exchange data. It provides:
//! 1. **Latency:** An object written at cycle `c` becomes readable at `c + latency`.
//! 2. **Bandwidth:** At most `capacity` objects may be written, and read, per cycle.
//! 3. **Direction:** The producer holds a [`SignalTx`] and the consumer a [`SignalRx`].
//!
//! Both halves share the in-flight queue through `Rc<RefCell<_>>`; the whole
//! simulation runs on one thread and every unit is clocked in turn.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Misuse of a signal by its producer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// More objects were written in one cycle than the signal carries.
    #[error("signal {signal}: bandwidth of {capacity} objects per cycle exceeded at cycle {cycle}")]
    BandwidthExceeded {
        /// Signal name.
        signal: String,
        /// Objects per cycle.
        capacity: usize,
        /// Cycle of the offending write.
        cycle: u64,
    },

    /// A write was issued for a cycle earlier than a previous write.
    #[error("signal {signal}: write at cycle {cycle} after a write at cycle {last}")]
    OutOfOrder {
        /// Signal name.
        signal: String,
        /// Cycle of the offending write.
        cycle: u64,
        /// Cycle of the latest accepted write.
        last: u64,
    },
}

struct Channel<T> {
    name: String,
    capacity: usize,
    latency: u64,
    in_flight: VecDeque<(u64, T)>,
    write_cycle: u64,
    writes: usize,
    read_cycle: u64,
    reads: usize,
}

/// Creates a signal and returns its producer and consumer halves.
///
/// # Arguments
///
/// * `name` - Name used in traces and errors.
/// * `capacity` - Objects per cycle in each direction (at least 1).
/// * `latency` - Cycles between a write and the earliest matching read.
pub fn signal<T>(name: &str, capacity: usize, latency: u64) -> (SignalTx<T>, SignalRx<T>) {
    let channel = Rc::new(RefCell::new(Channel {
        name: name.to_owned(),
        capacity: capacity.max(1),
        latency,
        in_flight: VecDeque::new(),
        write_cycle: 0,
        writes: 0,
        read_cycle: 0,
        reads: 0,
    }));
    (
        SignalTx {
            channel: Rc::clone(&channel),
        },
        SignalRx { channel },
    )
}

/// Producer half of a signal.
pub struct SignalTx<T> {
    channel: Rc<RefCell<Channel<T>>>,
}

impl<T> SignalTx<T> {
    /// Sends an object, visible to the consumer `latency` cycles later.
    ///
    /// # Errors
    ///
    /// Fails when the per-cycle bandwidth is exhausted or `cycle` is older than
    /// a previous write.
    pub fn write(&self, cycle: u64, item: T) -> Result<(), SignalError> {
        let mut ch = self.channel.borrow_mut();
        if cycle < ch.write_cycle {
            return Err(SignalError::OutOfOrder {
                signal: ch.name.clone(),
                cycle,
                last: ch.write_cycle,
            });
        }
        if cycle > ch.write_cycle {
            ch.write_cycle = cycle;
            ch.writes = 0;
        }
        if ch.writes >= ch.capacity {
            return Err(SignalError::BandwidthExceeded {
                signal: ch.name.clone(),
                capacity: ch.capacity,
                cycle,
            });
        }
        ch.writes += 1;
        let arrival = cycle + ch.latency;
        ch.in_flight.push_back((arrival, item));
        Ok(())
    }

    /// Number of objects written but not yet consumed.
    pub fn in_flight(&self) -> usize {
        self.channel.borrow().in_flight.len()
    }

    /// Name of the signal.
    pub fn name(&self) -> String {
        self.channel.borrow().name.clone()
    }
}

impl<T> fmt::Debug for SignalTx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = self.channel.borrow();
        f.debug_struct("SignalTx")
            .field("name", &ch.name)
            .field("in_flight", &ch.in_flight.len())
            .finish()
    }
}

/// Consumer half of a signal.
pub struct SignalRx<T> {
    channel: Rc<RefCell<Channel<T>>>,
}

impl<T> SignalRx<T> {
    /// Receives the oldest object that has arrived by `cycle`.
    ///
    /// Returns `None` when nothing has arrived yet or the per-cycle read
    /// bandwidth has been used up.
    pub fn read(&self, cycle: u64) -> Option<T> {
        let mut ch = self.channel.borrow_mut();
        if cycle != ch.read_cycle {
            ch.read_cycle = cycle;
            ch.reads = 0;
        }
        if ch.reads >= ch.capacity {
            return None;
        }
        match ch.in_flight.front() {
            Some(&(arrival, _)) if arrival <= cycle => {
                ch.reads += 1;
                ch.in_flight.pop_front().map(|(_, item)| item)
            }
            _ => None,
        }
    }

    /// Number of objects written but not yet consumed.
    pub fn in_flight(&self) -> usize {
        self.channel.borrow().in_flight.len()
    }

    /// Name of the signal.
    pub fn name(&self) -> String {
        self.channel.borrow().name.clone()
    }
}

impl<T> fmt::Debug for SignalRx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = self.channel.borrow();
        f.debug_struct("SignalRx")
            .field("name", &ch.name)
            .field("in_flight", &ch.in_flight.len())
            .finish()
    }
}
