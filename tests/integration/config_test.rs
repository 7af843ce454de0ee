use procwatch::core::config::EngineConfig;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.max_concurrent, 15);
    assert_eq!(config.process_timeout_ms, 150);
    assert_eq!(config.cpu_timeout_ms, 5);
    assert_eq!(config.refresh_interval_secs, 10);
    assert_eq!(config.full_refresh_threshold, 50);
}

#[test]
fn test_config_missing_file_returns_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.json");

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let config = EngineConfig {
        max_concurrent: 4,
        refresh_interval_secs: 2,
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "max_concurrent": 8 }"#).unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.max_concurrent, 8);
    assert_eq!(config.process_timeout_ms, 150);
}

#[test]
fn test_config_corrupt_file_falls_back() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_config_rejects_zero_concurrency() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "max_concurrent": 0 }"#).unwrap();

    assert!(EngineConfig::load(&path).is_err());
}
