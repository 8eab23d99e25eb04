//! # Configuration Tests
//!
//! Tests for configuration structures, JSON deserialization, defaults and
//! validation.

use std::io::Write;

use pretty_assertions::assert_eq;
use rstest::rstest;
use zstsim_core::common::{ConfigError, TileLayout};
use zstsim_core::config::*;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert!(!config.general.trace);
    assert_eq!(config.general.max_cycles, 1_000_000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_zstencil_config_defaults() {
    let zst = ZStencilConfig::default();
    assert_eq!(zst.stamps_cycle, 1);
    assert_eq!(zst.tiling, TileLayout::default());
    assert_eq!(zst.group_size(), 4);
    assert_eq!(zst.bytes_pixel, 4);
    assert_eq!(zst.stamp_bytes(), 16);
    assert_eq!(zst.queue_size, 32);
    assert_eq!(zst.test_rate, 1);
    assert_eq!(zst.test_latency, 2);
    assert_eq!(zst.upstream_reserve_cycles, 10);
    assert!(zst.disable_compression);
    assert!(zst.disable_hz_update);
    assert!(!zst.hz_enabled());
}

#[test]
fn test_cache_config_defaults() {
    let cache = ZCacheConfig::default();
    assert_eq!(cache.ways, 4);
    assert_eq!(cache.lines, 16);
    assert_eq!(cache.stamps_line, 16);
    assert_eq!(cache.read_ports, 1);
    assert_eq!(cache.write_ports, 1);
    assert_eq!(cache.request_queue, 8);
    assert_eq!(cache.max_blocks, 16384);
    assert_eq!(cache.blocks_cycle, 64);
    assert_eq!(cache.policy, ReplacementPolicy::Lru);
}

#[test]
fn test_memory_config_defaults() {
    let memory = MemoryConfig::default();
    assert_eq!(memory.latency, 20);
    assert_eq!(memory.size, 16 * 1024 * 1024);
    assert_eq!(memory.max_pending_reads, 8);
}

#[test]
fn test_empty_json_gives_defaults() {
    let config = Config::from_json("{}").unwrap();
    assert_eq!(config.zstencil.queue_size, ZStencilConfig::default().queue_size);
    assert_eq!(config.cache.ways, ZCacheConfig::default().ways);
}

#[test]
fn test_partial_sections_keep_field_defaults() {
    let config = Config::from_json(r#"{ "zstencil": { "test_rate": 3 }, "cache": { "policy": "FIFO" } }"#)
        .unwrap();
    assert_eq!(config.zstencil.test_rate, 3);
    assert_eq!(config.zstencil.test_latency, 2);
    assert_eq!(config.cache.policy, ReplacementPolicy::Fifo);
    assert_eq!(config.cache.lines, 16);
}

#[test]
fn test_hz_update_requires_compression() {
    let json = r#"{ "zstencil": { "disable_hz_update": false } }"#;
    assert!(matches!(
        Config::from_json(json),
        Err(ConfigError::HzUpdateWithoutCompression)
    ));

    let json = r#"{ "zstencil": { "disable_hz_update": false, "disable_compression": false } }"#;
    assert!(Config::from_json(json).unwrap().zstencil.hz_enabled());
}

#[rstest]
#[case(r#"{ "zstencil": { "stamps_cycle": 0 } }"#, "zstencil.stamps_cycle")]
#[case(r#"{ "zstencil": { "test_rate": 0 } }"#, "zstencil.test_rate")]
#[case(r#"{ "zstencil": { "tiling": { "gen_w": 0 } } }"#, "zstencil.tiling.gen_w")]
#[case(r#"{ "cache": { "ways": 0 } }"#, "cache.ways")]
#[case(r#"{ "memory": { "max_pending_reads": 0 } }"#, "memory.max_pending_reads")]
fn test_zero_parameters_are_rejected(#[case] json: &str, #[case] field: &str) {
    match Config::from_json(json) {
        Err(ConfigError::Zero(name)) => assert_eq!(name, field),
        other => panic!("expected Zero({field}), got {other:?}"),
    }
}

#[rstest]
#[case(r#"{ "cache": { "lines": 12 } }"#, "cache.lines", 12)]
#[case(r#"{ "cache": { "stamps_line": 6 } }"#, "cache.stamps_line", 6)]
fn test_cache_geometry_must_be_power_of_two(#[case] json: &str, #[case] field: &str, #[case] value: usize) {
    match Config::from_json(json) {
        Err(ConfigError::NotPowerOfTwo { field: f, value: v }) => {
            assert_eq!(f, field);
            assert_eq!(v, value);
        }
        other => panic!("expected NotPowerOfTwo, got {other:?}"),
    }
}

#[test]
fn test_other_pixel_sizes_are_rejected() {
    assert!(matches!(
        Config::from_json(r#"{ "zstencil": { "bytes_pixel": 2 } }"#),
        Err(ConfigError::UnsupportedPixelSize(2))
    ));
}

#[test]
fn test_queue_needs_two_entries() {
    assert!(matches!(
        Config::from_json(r#"{ "zstencil": { "queue_size": 1 } }"#),
        Err(ConfigError::QueueTooSmall(1))
    ));
}

/// A queue smaller than the upstream reserve could never report ready.
#[test]
fn test_queue_must_hold_the_upstream_reserve() {
    match Config::from_json(r#"{ "zstencil": { "queue_size": 4 } }"#) {
        Err(ConfigError::ReserveExceedsQueue { reserve, queue_size }) => {
            assert_eq!(reserve, 10);
            assert_eq!(queue_size, 4);
        }
        other => panic!("expected ReserveExceedsQueue, got {other:?}"),
    }

    let json = r#"{ "zstencil": { "queue_size": 8, "stamps_cycle": 2, "upstream_reserve_cycles": 4 } }"#;
    assert!(Config::from_json(json).is_ok());
}

#[test]
fn test_compression_needs_full_lines() {
    let json = r#"{ "zstencil": { "disable_compression": false }, "cache": { "stamps_line": 8 } }"#;
    assert!(matches!(
        Config::from_json(json),
        Err(ConfigError::CompressionLineTooSmall(8))
    ));
}

#[test]
fn test_malformed_json_is_a_parse_error() {
    assert!(matches!(
        Config::from_json(r#"{ "zstencil": { "queue_size": "many" } }"#),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "memory": {{ "latency": 7 }}, "general": {{ "trace": true }} }}"#).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.memory.latency, 7);
    assert!(config.general.trace);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    match Config::from_file(&path) {
        Err(ConfigError::Io { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected Io error, got {other:?}"),
    }
}
