//! # Tile Cache Tests
//!
//! Drives a `ZCache` against the video memory model through real signals.

use pretty_assertions::assert_eq;
use rstest::rstest;
use zstsim_core::cache::{CacheBusy, ClearStatus, TileCache, ZCache};
use zstsim_core::config::{MemoryConfig, ReplacementPolicy, ZCacheConfig};
use zstsim_core::memory::{MemoryState, MemoryTransaction, VideoMemory};
use zstsim_core::signal::{SignalRx, SignalTx, signal};

const STAMP_BYTES: usize = 16;

struct Bench {
    cache: ZCache,
    memory: VideoMemory,
    to_memory: SignalTx<MemoryTransaction>,
    from_memory: SignalRx<MemoryTransaction>,
    state: MemoryState,
    cycle: u64,
}

impl Bench {
    fn new(cache: ZCacheConfig) -> Self {
        let (to_memory, requests) = signal("request", 1, 1);
        let (replies, from_memory) = signal("data", 2, 1);
        let memory_config = MemoryConfig {
            latency: 4,
            size: 1 << 20,
            ..MemoryConfig::default()
        };
        Self {
            cache: ZCache::new(&cache, STAMP_BYTES, false),
            memory: VideoMemory::new(&memory_config, requests, replies),
            to_memory,
            from_memory,
            state: MemoryState::None,
            cycle: 0,
        }
    }

    fn tick(&mut self) {
        while let Some(txn) = self.from_memory.read(self.cycle) {
            match txn {
                MemoryTransaction::State(state) => self.state = state,
                other => self.cache.process_memory_transaction(other),
            }
        }
        if let Some(txn) = self.cache.update(self.cycle, self.state) {
            self.to_memory.write(self.cycle, txn).unwrap();
        }
        self.memory.clock(self.cycle).unwrap();
        self.cycle += 1;
    }

    fn clear(&mut self) {
        assert_eq!(self.cache.clear(0x00ff_ffff, 0), ClearStatus::InProgress);
        while self.cache.clear(0x00ff_ffff, 0) == ClearStatus::InProgress {}
    }
}

fn small_cache() -> ZCacheConfig {
    ZCacheConfig {
        ways: 2,
        lines: 4,
        stamps_line: 4,
        max_blocks: 64,
        blocks_cycle: 16,
        ..ZCacheConfig::default()
    }
}

// ══════════════════════════════════════════════════════════
// Fill and write-back
// ══════════════════════════════════════════════════════════

#[test]
fn test_miss_reads_line_from_memory() {
    let mut bench = Bench::new(small_cache());
    let pattern: Vec<u8> = (0..64).collect();
    bench.memory.write_bytes(0x1000, &pattern);

    let slot = bench.cache.fetch(0x1010).unwrap();
    let mut out = [0u8; 16];
    let mut waited = 0;
    while bench.cache.read(0x1010, slot, &mut out).is_err() {
        bench.tick();
        waited += 1;
        assert!(waited < 50, "line never filled");
    }
    // Request and data each cross a one cycle signal on top of the memory latency.
    assert!(waited >= 4);
    assert_eq!(out.to_vec(), pattern[16..32].to_vec());
    assert!(!bench.cache.has_pending_requests());
}

#[test]
fn test_flush_writes_dirty_lines_back() {
    let mut bench = Bench::new(small_cache());
    bench.clear();

    let slot = bench.cache.fetch(0x40).unwrap();
    bench.cache.write(0x44, slot, &0x0000_1234u32.to_le_bytes()).unwrap();
    assert!(bench.cache.is_dirty(0x40));

    let mut flushed = bench.cache.flush();
    assert!(!flushed);
    for _ in 0..20 {
        bench.tick();
        flushed = bench.cache.flush();
        if flushed {
            break;
        }
    }
    assert!(flushed);
    // The memory stores write data one cycle after the cache sent it.
    bench.tick();

    assert_eq!(bench.memory.read_u32(0x44), 0x0000_1234);
    assert_eq!(bench.memory.read_u32(0x40), 0x00ff_ffff);
    assert!(!bench.cache.is_dirty(0x40));
}

#[test]
fn test_full_request_queue_makes_fetch_busy() {
    let config = ZCacheConfig {
        request_queue: 1,
        ..small_cache()
    };
    let mut bench = Bench::new(config);

    let first = bench.cache.fetch(0x000).unwrap();
    assert_eq!(bench.cache.fetch(0x040), Err(CacheBusy));

    let mut out = [0u8; 16];
    for _ in 0..50 {
        if bench.cache.read(0x000, first, &mut out).is_ok() {
            break;
        }
        bench.tick();
    }
    assert!(bench.cache.fetch(0x040).is_ok());
}

// ══════════════════════════════════════════════════════════
// Replacement
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::lru_keeps_recently_used(ReplacementPolicy::Lru, false)]
#[case::fifo_evicts_oldest(ReplacementPolicy::Fifo, true)]
fn test_victim_selection(#[case] policy: ReplacementPolicy, #[case] b_survives: bool) {
    let config = ZCacheConfig {
        ways: 2,
        lines: 1,
        policy,
        ..small_cache()
    };
    let mut bench = Bench::new(config);
    bench.clear();

    // Every fetch is written straight away so the line can be evicted again.
    let touch = |bench: &mut Bench, address: u32| {
        let slot = bench.cache.fetch(address).unwrap();
        bench.cache.write(address, slot, &1u32.to_le_bytes()).unwrap();
        bench.tick();
    };

    let (a, b, c) = (0x000, 0x040, 0x080);
    touch(&mut bench, a);
    touch(&mut bench, b);
    touch(&mut bench, a);
    touch(&mut bench, c);

    let hits = bench.cache.stats().hits;
    let _ = bench.cache.fetch(b).unwrap();
    assert_eq!(bench.cache.stats().hits == hits + 1, b_survives);
}
