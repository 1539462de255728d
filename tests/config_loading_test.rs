//! Config file loading and merging with defaults

use autobackup::config::{Config, CONFIG_FILE_NAME};
use autobackup::environment::NetworkKind;
use autobackup::error::ConfigError;
use autobackup::pipeline::UploadPipeline;
use autobackup::scanner::Scanner;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_full_config_file() {
	let tmp = TempDir::new().unwrap();
	let path = tmp.path().join(CONFIG_FILE_NAME);
	fs::write(
		&path,
		r#"
state_dir = "/var/lib/autobackup"
monitored_dirs = ["/home/me/DCIM", "/home/me/Documents"]
exclude_patterns = ["**/cache/**"]
follow_symlinks = true
max_depth = 12
log_level = "debug"

[remote]
endpoint = "https://backup.example.org"
upload_path = "/v2/upload"
api_key = "k-123"
timeout_secs = 60

[upload]
max_attempts = 4
backoff_base_ms = 500
backoff_max_ms = 8000
inter_item_delay_ms = 250
max_file_size_mb = 100

[trigger]
require_battery_not_low = false
assume_network = "wifi"
"#,
	)
	.unwrap();

	let config = Config::load(Some(path.as_path())).unwrap();
	assert_eq!(config.state_dir, PathBuf::from("/var/lib/autobackup"));
	assert_eq!(config.monitored_dirs.len(), 2);
	assert!(config.follow_symlinks);
	assert_eq!(config.remote.upload_url(), "https://backup.example.org/v2/upload");
	assert_eq!(config.remote.api_key.as_deref(), Some("k-123"));
	assert!(!config.trigger.require_battery_not_low);
	assert!(config.trigger.require_network);
	assert_eq!(config.trigger.assume_network, Some(NetworkKind::Wifi));

	let pipeline = UploadPipeline::from_config(&config.upload);
	assert_eq!(pipeline.retry.max_attempts, 4);
	assert_eq!(pipeline.retry.backoff(1), Duration::from_millis(500));
	assert_eq!(pipeline.retry.backoff(10), Duration::from_millis(8000));
	assert_eq!(pipeline.inter_item_delay, Duration::from_millis(250));
	assert_eq!(pipeline.max_file_size, Some(100 * 1024 * 1024));

	let scanner = Scanner::from_config(&config).unwrap();
	assert_eq!(scanner.dirs(), config.monitored_dirs.as_slice());
}

#[test]
fn test_missing_explicit_file_is_an_error() {
	let tmp = TempDir::new().unwrap();
	let result = Config::load(Some(tmp.path().join("absent.toml").as_path()));
	assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_malformed_file_reports_path() {
	let tmp = TempDir::new().unwrap();
	let path = tmp.path().join("bad.toml");
	fs::write(&path, "[upload]\nmax_attempts = \"three\"\n").unwrap();

	match Config::load(Some(path.as_path())) {
		Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
		other => panic!("expected parse error, got {:?}", other),
	}
}

#[test]
fn test_invalid_values_fail_validation() {
	let tmp = TempDir::new().unwrap();
	let path = tmp.path().join("invalid.toml");
	fs::write(&path, "[upload]\nbackoff_base_ms = 5000\nbackoff_max_ms = 100\n").unwrap();

	assert!(matches!(Config::load(Some(path.as_path())), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_bad_exclude_pattern_fails_scanner_setup() {
	let config =
		Config { exclude_patterns: vec!["[unclosed".to_string()], ..Config::default() };
	assert!(Scanner::from_config(&config).is_err());
}

// vim: ts=4
