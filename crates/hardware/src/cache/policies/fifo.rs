//! First-In, First-Out (FIFO) Replacement Policy.
//!
//! This policy evicts the oldest tile line in a set, regardless of how recently
//! it was accessed. It operates as a round robin pointer per set; when the way
//! under the pointer is not evictable the next ways are tried in order.

use super::ReplacementPolicy;

/// FIFO Policy state.
#[derive(Debug)]
pub struct FifoPolicy {
    /// Tracks the next way to be evicted for each set.
    next_way: Vec<usize>,
    /// Number of ways in the cache.
    ways: usize,
}

impl FifoPolicy {
    /// Creates a new FIFO policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            next_way: vec![0; sets],
            ways,
        }
    }
}

impl ReplacementPolicy for FifoPolicy {
    /// Accesses do not change the eviction order.
    fn update(&mut self, _set: usize, _way: usize) {}

    fn victim(&mut self, set: usize, eligible: &dyn Fn(usize) -> bool) -> Option<usize> {
        let start = self.next_way[set];
        let way = (0..self.ways)
            .map(|i| (start + i) % self.ways)
            .find(|&way| eligible(way))?;
        self.next_way[set] = (way + 1) % self.ways;
        Some(way)
    }

    fn reset(&mut self) {
        self.next_way.fill(0);
    }
}
