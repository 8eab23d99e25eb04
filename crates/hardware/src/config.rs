//! Configuration system for the Z/stencil stage simulator.
//!
//! This module defines all configuration structures used to parameterize the
//! simulator. It provides:
//! 1. **Defaults:** Baseline hardware constants (queue, tiling, cache, memory).
//! 2. **Structures:** Hierarchical config for general, Z/stencil stage, tile cache and memory.
//! 3. **Validation:** Consistency checks run before any unit is built.
//!
//! Configuration is supplied as JSON (`Config::from_json`, `Config::from_file`) or
//! taken from `Config::default()`.

use std::path::Path;

use serde::Deserialize;

use crate::common::constants::BYTES_PER_PIXEL;
use crate::common::error::ConfigError;
use crate::common::tiling::TileLayout;

/// Default configuration constants for the simulator.
mod defaults {
    /// Cycles simulated before the driver gives up on a batch.
    pub const MAX_CYCLES: u64 = 1_000_000;

    /// Stamps received from the upstream unit per cycle.
    pub const STAMPS_CYCLE: usize = 1;

    /// Bytes per depth/stencil word.
    pub const BYTES_PIXEL: usize = crate::common::constants::BYTES_PER_PIXEL;

    /// Entries in the stamp queue.
    pub const QUEUE_SIZE: usize = 32;

    /// Cycles between two test issues.
    pub const TEST_RATE: u32 = 1;

    /// Cycles from test issue to test completion.
    pub const TEST_LATENCY: u64 = 2;

    /// Free queue entries, in cycles of input, required before the upstream
    /// unit is told it may send.
    pub const UPSTREAM_RESERVE_CYCLES: usize = crate::common::constants::UPSTREAM_RESERVE_CYCLES;

    /// Latency of the hierarchical Z update signal.
    pub const HZ_UPDATE_LATENCY: u64 = 1;

    /// Tile cache associativity.
    pub const CACHE_WAYS: usize = 4;

    /// Sets per way.
    pub const CACHE_LINES: usize = 16;

    /// Stamps per cache line (one 8x8 pixel tile with 2x2 stamps).
    pub const CACHE_STAMPS_LINE: usize = 16;

    /// Cache read ports.
    pub const CACHE_READ_PORTS: usize = 1;

    /// Cache write ports.
    pub const CACHE_WRITE_PORTS: usize = 1;

    /// Pending memory requests per direction.
    pub const CACHE_REQUEST_QUEUE: usize = 8;

    /// Buffer blocks tracked by the clear state table.
    pub const CACHE_MAX_BLOCKS: usize = 16_384;

    /// Blocks cleared per cycle.
    pub const CACHE_BLOCKS_CYCLE: usize = 64;

    /// Video memory access latency.
    pub const MEMORY_LATENCY: u64 = 20;

    /// Video memory size (16 MiB).
    pub const MEMORY_SIZE: usize = 16 * 1024 * 1024;

    /// Outstanding reads before the memory stops accepting new ones.
    pub const MEMORY_MAX_PENDING_READS: usize = 8;
}

/// Tile cache replacement policy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least Recently Used.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// First-In, First-Out.
    #[serde(alias = "Fifo")]
    Fifo,
}

/// Root configuration structure for the simulator.
///
/// Every section and field is optional in JSON and falls back to its default.
///
/// # Examples
///
/// ```
/// use zstsim_core::config::{Config, ReplacementPolicy};
///
/// let json = r#"{
///     "general": { "trace": true },
///     "zstencil": {
///         "queue_size": 16,
///         "tiling": { "stamp_w": 1, "stamp_h": 1 }
///     },
///     "cache": { "ways": 2, "policy": "FIFO" },
///     "memory": { "latency": 4 }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert!(config.general.trace);
/// assert_eq!(config.zstencil.queue_size, 16);
/// assert_eq!(config.zstencil.tiling.stamp_samples(), 1);
/// assert_eq!(config.cache.policy, ReplacementPolicy::Fifo);
/// assert_eq!(config.memory.latency, 4);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General simulation settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Z/stencil stage parameters
    #[serde(default)]
    pub zstencil: ZStencilConfig,
    /// Tile cache parameters
    #[serde(default)]
    pub cache: ZCacheConfig,
    /// Video memory parameters
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Config {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or any validation error.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_json`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Checks the configuration for values the hardware model cannot represent.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zstencil.validate()?;
        self.cache.validate(&self.zstencil)?;
        self.memory.validate()
    }
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Emit per-cycle trace events (stage activity, cache traffic).
    #[serde(default)]
    pub trace: bool,

    /// Upper bound on simulated cycles for a single command.
    #[serde(default = "GeneralConfig::default_max_cycles")]
    pub max_cycles: u64,
}

impl GeneralConfig {
    fn default_max_cycles() -> u64 {
        defaults::MAX_CYCLES
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            trace: false,
            max_cycles: defaults::MAX_CYCLES,
        }
    }
}

/// Z/stencil test stage parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ZStencilConfig {
    /// Stamps received per cycle
    #[serde(default = "ZStencilConfig::default_stamps_cycle")]
    pub stamps_cycle: usize,

    /// Framebuffer tile hierarchy; the stamp size sets the samples per stamp
    #[serde(default)]
    pub tiling: TileLayout,

    /// Bytes per depth/stencil word
    #[serde(default = "ZStencilConfig::default_bytes_pixel")]
    pub bytes_pixel: usize,

    /// Stamp queue entries
    #[serde(default = "ZStencilConfig::default_queue_size")]
    pub queue_size: usize,

    /// Cycles between test issues
    #[serde(default = "ZStencilConfig::default_test_rate")]
    pub test_rate: u32,

    /// Cycles from test issue to completion
    #[serde(default = "ZStencilConfig::default_test_latency")]
    pub test_latency: u64,

    /// Free entries, in cycles of input, required to report ready upstream
    #[serde(default = "ZStencilConfig::default_upstream_reserve_cycles")]
    pub upstream_reserve_cycles: usize,

    /// Disable depth block compression in the tile cache
    #[serde(default = "ZStencilConfig::default_true")]
    pub disable_compression: bool,

    /// Disable hierarchical Z updates
    #[serde(default = "ZStencilConfig::default_true")]
    pub disable_hz_update: bool,

    /// Latency of the hierarchical Z update signal
    #[serde(default = "ZStencilConfig::default_hz_update_latency")]
    pub hz_update_latency: u64,
}

impl ZStencilConfig {
    fn default_stamps_cycle() -> usize {
        defaults::STAMPS_CYCLE
    }

    fn default_bytes_pixel() -> usize {
        defaults::BYTES_PIXEL
    }

    fn default_queue_size() -> usize {
        defaults::QUEUE_SIZE
    }

    fn default_test_rate() -> u32 {
        defaults::TEST_RATE
    }

    fn default_test_latency() -> u64 {
        defaults::TEST_LATENCY
    }

    fn default_upstream_reserve_cycles() -> usize {
        defaults::UPSTREAM_RESERVE_CYCLES
    }

    fn default_true() -> bool {
        true
    }

    fn default_hz_update_latency() -> u64 {
        defaults::HZ_UPDATE_LATENCY
    }

    /// Samples per stamp.
    #[inline]
    pub const fn group_size(&self) -> usize {
        self.tiling.stamp_samples()
    }

    /// Bytes of depth/stencil data covered by one stamp.
    #[inline]
    pub const fn stamp_bytes(&self) -> usize {
        self.group_size() * self.bytes_pixel
    }

    /// Returns true if the stage forwards hierarchical Z updates.
    #[inline]
    pub const fn hz_enabled(&self) -> bool {
        !self.disable_compression && !self.disable_hz_update
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stamps_cycle == 0 {
            return Err(ConfigError::Zero("zstencil.stamps_cycle"));
        }
        let t = &self.tiling;
        for (name, value) in [
            ("zstencil.tiling.stamp_w", t.stamp_w),
            ("zstencil.tiling.stamp_h", t.stamp_h),
            ("zstencil.tiling.gen_w", t.gen_w),
            ("zstencil.tiling.gen_h", t.gen_h),
            ("zstencil.tiling.scan_w", t.scan_w),
            ("zstencil.tiling.scan_h", t.scan_h),
            ("zstencil.tiling.over_w", t.over_w),
            ("zstencil.tiling.over_h", t.over_h),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.bytes_pixel != BYTES_PER_PIXEL {
            return Err(ConfigError::UnsupportedPixelSize(self.bytes_pixel));
        }
        if self.queue_size < 2 {
            return Err(ConfigError::QueueTooSmall(self.queue_size));
        }
        let reserve = self.upstream_reserve_cycles * self.stamps_cycle;
        if reserve > self.queue_size {
            return Err(ConfigError::ReserveExceedsQueue {
                reserve,
                queue_size: self.queue_size,
            });
        }
        if self.test_rate == 0 {
            return Err(ConfigError::Zero("zstencil.test_rate"));
        }
        if self.test_latency == 0 {
            return Err(ConfigError::Zero("zstencil.test_latency"));
        }
        if self.hz_update_latency == 0 {
            return Err(ConfigError::Zero("zstencil.hz_update_latency"));
        }
        if !self.disable_hz_update && self.disable_compression {
            return Err(ConfigError::HzUpdateWithoutCompression);
        }
        Ok(())
    }
}

impl Default for ZStencilConfig {
    fn default() -> Self {
        Self {
            stamps_cycle: defaults::STAMPS_CYCLE,
            tiling: TileLayout::default(),
            bytes_pixel: defaults::BYTES_PIXEL,
            queue_size: defaults::QUEUE_SIZE,
            test_rate: defaults::TEST_RATE,
            test_latency: defaults::TEST_LATENCY,
            upstream_reserve_cycles: defaults::UPSTREAM_RESERVE_CYCLES,
            disable_compression: true,
            disable_hz_update: true,
            hz_update_latency: defaults::HZ_UPDATE_LATENCY,
        }
    }
}

/// Tile cache parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ZCacheConfig {
    /// Associativity
    #[serde(default = "ZCacheConfig::default_ways")]
    pub ways: usize,

    /// Sets (lines per way)
    #[serde(default = "ZCacheConfig::default_lines")]
    pub lines: usize,

    /// Stamps stored in a line
    #[serde(default = "ZCacheConfig::default_stamps_line")]
    pub stamps_line: usize,

    /// Stamp reads per cycle
    #[serde(default = "ZCacheConfig::default_read_ports")]
    pub read_ports: usize,

    /// Stamp writes per cycle
    #[serde(default = "ZCacheConfig::default_write_ports")]
    pub write_ports: usize,

    /// Pending line reads and pending write-backs (each)
    #[serde(default = "ZCacheConfig::default_request_queue")]
    pub request_queue: usize,

    /// Blocks tracked by the clear state table
    #[serde(default = "ZCacheConfig::default_max_blocks")]
    pub max_blocks: usize,

    /// Blocks cleared per cycle
    #[serde(default = "ZCacheConfig::default_blocks_cycle")]
    pub blocks_cycle: usize,

    /// Replacement policy
    #[serde(default)]
    pub policy: ReplacementPolicy,
}

impl ZCacheConfig {
    fn default_ways() -> usize {
        defaults::CACHE_WAYS
    }

    fn default_lines() -> usize {
        defaults::CACHE_LINES
    }

    fn default_stamps_line() -> usize {
        defaults::CACHE_STAMPS_LINE
    }

    fn default_read_ports() -> usize {
        defaults::CACHE_READ_PORTS
    }

    fn default_write_ports() -> usize {
        defaults::CACHE_WRITE_PORTS
    }

    fn default_request_queue() -> usize {
        defaults::CACHE_REQUEST_QUEUE
    }

    fn default_max_blocks() -> usize {
        defaults::CACHE_MAX_BLOCKS
    }

    fn default_blocks_cycle() -> usize {
        defaults::CACHE_BLOCKS_CYCLE
    }

    fn validate(&self, zstencil: &ZStencilConfig) -> Result<(), ConfigError> {
        for (name, value) in [
            ("cache.ways", self.ways),
            ("cache.lines", self.lines),
            ("cache.stamps_line", self.stamps_line),
            ("cache.read_ports", self.read_ports),
            ("cache.write_ports", self.write_ports),
            ("cache.request_queue", self.request_queue),
            ("cache.max_blocks", self.max_blocks),
            ("cache.blocks_cycle", self.blocks_cycle),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        for (field, value) in [("cache.lines", self.lines), ("cache.stamps_line", self.stamps_line)] {
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo { field, value });
            }
        }
        if !zstencil.disable_compression && self.stamps_line < 16 {
            return Err(ConfigError::CompressionLineTooSmall(self.stamps_line));
        }
        Ok(())
    }
}

impl Default for ZCacheConfig {
    fn default() -> Self {
        Self {
            ways: defaults::CACHE_WAYS,
            lines: defaults::CACHE_LINES,
            stamps_line: defaults::CACHE_STAMPS_LINE,
            read_ports: defaults::CACHE_READ_PORTS,
            write_ports: defaults::CACHE_WRITE_PORTS,
            request_queue: defaults::CACHE_REQUEST_QUEUE,
            max_blocks: defaults::CACHE_MAX_BLOCKS,
            blocks_cycle: defaults::CACHE_BLOCKS_CYCLE,
            policy: ReplacementPolicy::default(),
        }
    }
}

/// Video memory parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Cycles from a read request to its data
    #[serde(default = "MemoryConfig::default_latency")]
    pub latency: u64,

    /// Memory size in bytes
    #[serde(default = "MemoryConfig::default_size")]
    pub size: usize,

    /// Outstanding reads before read requests are refused
    #[serde(default = "MemoryConfig::default_max_pending_reads")]
    pub max_pending_reads: usize,
}

impl MemoryConfig {
    fn default_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }

    fn default_size() -> usize {
        defaults::MEMORY_SIZE
    }

    fn default_max_pending_reads() -> usize {
        defaults::MEMORY_MAX_PENDING_READS
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::Zero("memory.size"));
        }
        if self.max_pending_reads == 0 {
            return Err(ConfigError::Zero("memory.max_pending_reads"));
        }
        Ok(())
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            latency: defaults::MEMORY_LATENCY,
            size: defaults::MEMORY_SIZE,
            max_pending_reads: defaults::MEMORY_MAX_PENDING_READS,
        }
    }
}
