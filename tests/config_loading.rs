//! Integration tests for config files on disk

mod common;

use common::builders::ConfigBuilder;
use envdash_rs::config::DashboardConfig;
use envdash_rs::error::EnvDashError;
use tempfile::TempDir;

#[test]
fn test_save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("envdash.toml");

    let config = ConfigBuilder::new()
        .broker("10.1.2.3", 1884)
        .capacity(60)
        .failure_threshold(5)
        .build();
    config.save(&path).unwrap();

    let loaded = DashboardConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = DashboardConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, DashboardConfig::default());
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("envdash.toml");
    std::fs::write(&path, "[history]\ncapacity = \"thirty\"\n").unwrap();

    assert!(DashboardConfig::load(&path).is_err());
    assert!(DashboardConfig::load_or_default(&path).is_err());
}

#[test]
fn test_custom_channel_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("envdash.toml");
    std::fs::write(
        &path,
        r#"
[[channels]]
key = "co2"
wire_topic = "lab/co2"
unit = "ppm"
chartable = true

[channels.simulation]
type = "walk"
min = 400.0
max = 1200.0
step = 10.0
initial = 450.0

[[channels]]
key = "door"
wire_topic = "lab/door"
kind = "text"
"#,
    )
    .unwrap();

    let config = DashboardConfig::load(&path).unwrap();
    let registry = config.registry().unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.resolve("lab/co2").unwrap().key, "co2");
    assert!(!registry.get("door").unwrap().chartable);
}

#[test]
fn test_conflicting_channels_fail_to_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("envdash.toml");
    std::fs::write(
        &path,
        r#"
[[channels]]
key = "a"
wire_topic = "same/topic"

[[channels]]
key = "b"
wire_topic = "same/topic"
"#,
    )
    .unwrap();

    let err = DashboardConfig::load(&path).unwrap_err();
    assert!(matches!(
        err,
        EnvDashError::WithContext { ref source, .. }
            if matches!(**source, EnvDashError::DuplicateTopicMapping { .. })
    ));
}
