//! Tests for settings files

use elastorm::{Addressing, Connection, Error, Settings};
use tempfile::tempdir;

#[test]
fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conf").join("elastorm.toml");

    let mut settings = Settings::default();
    settings.database.name = "blog".to_string();
    settings.database.addressing = Addressing::Typed;
    settings.database.window_size = Some(100);
    settings.logging.level = "debug".to_string();
    settings.save(&path).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded.database.name, "blog");
    assert_eq!(loaded.database.addressing, Addressing::Typed);
    assert_eq!(loaded.database.window_size, Some(100));
    assert_eq!(loaded.logging.level, "debug");
}

#[test]
fn test_load_or_default_without_file() {
    let dir = tempdir().unwrap();
    let settings = Settings::load_or_default(&dir.path().join("missing.toml")).unwrap();
    assert_eq!(settings.database.name, "default");
    assert_eq!(settings.database.port, "9200");
}

#[test]
fn test_malformed_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[database]\nport = 9200\n").unwrap();
    // port must be given as a string
    assert!(matches!(Settings::load_from(&path), Err(Error::Config(_))));
}

#[tokio::test]
async fn test_connect_with_bad_port_fails_before_network() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("elastorm.toml");
    std::fs::write(&path, "[database]\nport = \"92OO\"\n").unwrap();

    let settings = Settings::load_from(&path).unwrap();
    let err = Connection::connect(settings).await.unwrap_err();
    assert_eq!(err.to_string(), "Config error: PORT must be an integer");
}
