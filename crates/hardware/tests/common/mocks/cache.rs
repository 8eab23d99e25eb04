use std::sync::{Arc, Mutex};

use mockall::mock;
use zstsim_core::cache::{CacheBusy, ClearStatus, HzUpdate, TileCache, TileSlot};
use zstsim_core::memory::{MemoryState, MemoryTransaction};

mock! {
    pub Cache {}
    impl TileCache for Cache {
        fn fetch(&mut self, address: u32) -> Result<TileSlot, CacheBusy>;
        fn read(&mut self, address: u32, slot: TileSlot, out: &mut [u8]) -> Result<(), CacheBusy>;
        fn write(&mut self, address: u32, slot: TileSlot, data: &[u8]) -> Result<(), CacheBusy>;
        fn clear(&mut self, depth: u32, stencil: u8) -> ClearStatus;
        fn swap(&mut self, base: u32);
        fn flush(&mut self) -> bool;
        fn reset(&mut self);
        fn update(&mut self, cycle: u64, memory: MemoryState) -> Option<MemoryTransaction>;
        fn update_hz(&mut self) -> Option<HzUpdate>;
        fn process_memory_transaction(&mut self, transaction: MemoryTransaction);
        fn has_pending_requests(&self) -> bool;
    }
}

/// Cache operation seen by a [`MockCache`] built with [`recording_cache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    Fetch(u32),
    Read(u32),
    Write(u32),
}

/// Shared log of cache operations.
pub type CacheLog = Arc<Mutex<Vec<CacheOp>>>;

/// Expectations for the per-cycle housekeeping calls, which never fail.
pub fn idle_expectations(cache: &mut MockCache) {
    cache.expect_swap().return_const(());
    housekeeping(cache);
}

/// As [`idle_expectations`], leaving `swap` to the test.
pub fn housekeeping(cache: &mut MockCache) {
    cache.expect_reset().return_const(());
    cache.expect_update().returning(|_, _| None);
    cache.expect_update_hz().returning(|| None);
    cache.expect_process_memory_transaction().return_const(());
    cache.expect_has_pending_requests().return_const(false);
    cache.expect_flush().return_const(true);
    cache.expect_clear().return_const(ClearStatus::Done);
}

/// A cache that accepts every operation at once and whose buffer words all hold `stored`.
pub fn always_hit(stored: u32) -> MockCache {
    let mut cache = MockCache::new();
    idle_expectations(&mut cache);
    cache.expect_fetch().returning(|_| Ok(TileSlot::default()));
    cache.expect_read().returning(move |_, _, out| {
        for word in out.chunks_exact_mut(4) {
            word.copy_from_slice(&stored.to_le_bytes());
        }
        Ok(())
    });
    cache.expect_write().returning(|_, _, _| Ok(()));
    cache
}

/// A cache that logs every successful operation and refuses the first
/// `fetch_failures` fetches.
pub fn recording_cache(fetch_failures: usize) -> (MockCache, CacheLog) {
    let log: CacheLog = Arc::new(Mutex::new(Vec::new()));
    let mut cache = MockCache::new();
    idle_expectations(&mut cache);

    let mut failures = fetch_failures;
    let fetches = Arc::clone(&log);
    cache.expect_fetch().returning(move |address| {
        if failures > 0 {
            failures -= 1;
            return Err(CacheBusy);
        }
        fetches.lock().unwrap().push(CacheOp::Fetch(address));
        Ok(TileSlot::default())
    });

    let reads = Arc::clone(&log);
    cache.expect_read().returning(move |address, _, out| {
        out.fill(0xff);
        reads.lock().unwrap().push(CacheOp::Read(address));
        Ok(())
    });

    let writes = Arc::clone(&log);
    cache.expect_write().returning(move |address, _, _| {
        writes.lock().unwrap().push(CacheOp::Write(address));
        Ok(())
    });

    (cache, log)
}
