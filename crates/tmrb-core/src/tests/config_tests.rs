//! Tests for configuration loading and defaults

use std::path::PathBuf;
use std::time::Duration;

use crate::Error;
use crate::config::{Config, Directories, Openplanet};
use crate::log::DEFAULT_PLUGIN_PATH_MARKER;
use tempfile::TempDir;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.host, "127.0.0.1");
    assert!(config.port.is_none());
    assert!(config.openplanet.is_none());
    assert!(config.op_dir.is_none());
    assert_eq!(config.log_done_limit, 3);
    assert_eq!(config.log_check_interval(), Duration::from_secs(1));
    assert_eq!(config.plugin_path_marker, DEFAULT_PLUGIN_PATH_MARKER);
}

#[test]
fn test_config_parse_minimal() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_parse_partial() {
    let json = r#"{
        "openplanet": "Openplanet4",
        "opDir": "/games/Openplanet4",
        "logCheckInterval": 0.25
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.openplanet, Some(Openplanet::Openplanet4));
    assert_eq!(config.op_dir, Some(PathBuf::from("/games/Openplanet4")));
    assert_eq!(config.log_check_interval(), Duration::from_millis(250));
    assert_eq!(config.log_done_limit, 3);
    assert_eq!(config.host, "127.0.0.1");
}

#[test]
fn test_load_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_from_file() {
    let temp = TempDir::new().unwrap();
    let dirs = Directories::with_base(temp.path().join("tm-remote-build"));
    std::fs::create_dir_all(&dirs.config).unwrap();
    std::fs::write(
        &dirs.config_file,
        r#"{"host": "192.168.1.20", "port": 31000, "logDoneLimit": 5}"#,
    )
    .unwrap();

    let config = Config::load(&dirs.config_file).unwrap();

    assert_eq!(config.host, "192.168.1.20");
    assert_eq!(config.resolved_port(), Some(31000));
    assert_eq!(config.log_done_limit, 5);
}

#[test]
fn test_load_malformed_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(Config::load(&path), Err(Error::Json(_))));
}

#[test]
fn test_resolved_port_prefers_explicit_port() {
    let config = Config {
        port: Some(12345),
        openplanet: Some(Openplanet::OpenplanetTurbo),
        ..Config::default()
    };
    assert_eq!(config.resolved_port(), Some(12345));
}

#[test]
fn test_resolved_port_from_variant() {
    for (variant, port) in [
        (Openplanet::OpenplanetNext, 30000),
        (Openplanet::Openplanet4, 30001),
        (Openplanet::OpenplanetTurbo, 30002),
    ] {
        let config = Config {
            openplanet: Some(variant),
            ..Config::default()
        };
        assert_eq!(config.resolved_port(), Some(port));
    }

    assert_eq!(Config::default().resolved_port(), None);
}

#[test]
fn test_invalid_interval_falls_back() {
    let config = Config {
        log_check_interval: -1.0,
        ..Config::default()
    };
    assert_eq!(config.log_check_interval(), Duration::from_secs(1));

    let config = Config {
        log_check_interval: f64::NAN,
        ..Config::default()
    };
    assert_eq!(config.log_check_interval(), Duration::from_secs(1));
}

#[test]
fn test_openplanet_from_str() {
    assert_eq!(
        "OpenplanetNext".parse::<Openplanet>().unwrap(),
        Openplanet::OpenplanetNext
    );
    let err = "Openplanet5".parse::<Openplanet>().unwrap_err();
    assert!(err.to_string().contains("OpenplanetTurbo"));
}
