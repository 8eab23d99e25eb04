//! Tile Cache Replacement Policies.
//!
//! Selects the victim way of a set when a tile misses in the cache.
//!
//! # Policies
//!
//! - `Fifo`: First-In, First-Out (round robin).
//! - `Lru`: Least Recently Used.
//!
//! Lines that are reserved by in-flight stamps or still waiting for their fill
//! cannot be evicted, so victim selection takes an eligibility predicate and
//! may find no victim at all.

/// First-In, First-Out replacement policy.
pub mod fifo;

/// Least Recently Used replacement policy.
pub mod lru;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;

/// Trait for cache replacement policies.
///
/// Defines the interface for updating usage state and selecting victim lines.
pub trait ReplacementPolicy: Send + Sync + std::fmt::Debug {
    /// Updates the policy state when a line is accessed.
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    /// * `way` - The way index within the set that was accessed.
    fn update(&mut self, set: usize, way: usize);

    /// Selects a victim line to evict from a specific set.
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    /// * `eligible` - Returns true for ways that may be evicted now.
    ///
    /// # Returns
    ///
    /// The index of the way to evict, or `None` if no way is eligible.
    fn victim(&mut self, set: usize, eligible: &dyn Fn(usize) -> bool) -> Option<usize>;

    /// Forgets all usage history.
    fn reset(&mut self);
}
