use regionpool::{ConfigError, Pool, PoolConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("regionpool.toml");
    fs::write(
        &path,
        r#"
size = 2048
page_size = 1024
failed_threshold = 1
large_scan_limit = 8
"#,
    )
    .unwrap();

    let config = PoolConfig::load(&path).unwrap();
    assert_eq!(config, PoolConfig::new(2048)
        .with_page_size(1024)
        .with_failed_threshold(1)
        .with_large_scan_limit(8));

    let pool = Pool::with_config(&config).unwrap();
    assert_eq!(pool.max(), 1024);
    assert_eq!(pool.block_size(), 2048);
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = PoolConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_saved_config_reloads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("saved.toml");
    let config = PoolConfig::new(8192).with_large_scan_limit(2);

    fs::write(&path, config.to_toml()).unwrap();
    assert_eq!(PoolConfig::load(&path).unwrap(), config);
}

#[test]
fn test_from_env() {
    std::env::set_var("REGIONPOOL_SIZE", "4096");
    std::env::set_var("REGIONPOOL_FAILED_THRESHOLD", "2");
    let config = PoolConfig::from_env().unwrap();
    assert_eq!(config.size, 4096);
    assert_eq!(config.failed_threshold, 2);

    std::env::set_var("REGIONPOOL_LARGE_SCAN_LIMIT", "many");
    assert!(matches!(PoolConfig::from_env(), Err(ConfigError::Invalid(_))));

    for key in ["REGIONPOOL_SIZE", "REGIONPOOL_FAILED_THRESHOLD", "REGIONPOOL_LARGE_SCAN_LIMIT"] {
        std::env::remove_var(key);
    }
}
