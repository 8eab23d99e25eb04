//! Least Recently Used (LRU) Replacement Policy.
//!
//! This policy evicts the tile line that has not been accessed for the longest time.
//! It maintains a usage stack for each set. When a line is accessed, it is moved
//! to the top (Most Recently Used position). The victim is the lowest line in the
//! stack that is currently evictable.

use super::ReplacementPolicy;

/// LRU Policy state.
#[derive(Debug)]
pub struct LruPolicy {
    /// A vector of usage stacks (one per set).
    /// Index 0 is MRU, last index is LRU.
    usage: Vec<Vec<usize>>,
    ways: usize,
}

impl LruPolicy {
    /// Creates a new LRU policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            usage: vec![(0..ways).collect(); sets],
            ways,
        }
    }
}

impl ReplacementPolicy for LruPolicy {
    /// Moves the accessed `way` to the front of the usage stack (MRU position).
    fn update(&mut self, set: usize, way: usize) {
        let stack = &mut self.usage[set];
        if let Some(pos) = stack.iter().position(|&x| x == way) {
            let _ = stack.remove(pos);
        }
        stack.insert(0, way);
    }

    /// Walks the usage stack from the LRU end and returns the first evictable way.
    fn victim(&mut self, set: usize, eligible: &dyn Fn(usize) -> bool) -> Option<usize> {
        self.usage[set].iter().rev().copied().find(|&way| eligible(way))
    }

    fn reset(&mut self) {
        for stack in &mut self.usage {
            *stack = (0..self.ways).collect();
        }
    }
}
