//! Agent configuration
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (`--config PATH`, or `~/.autobackup/config.toml` when present)
//! 3. Environment variables (AUTOBACKUP_* prefix)
//!
//! User-facing [`Settings`](crate::types::Settings) are not part of this file;
//! they live in the state store.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::environment::NetworkKind;
use crate::error::ConfigError;
use crate::logging::*;
use crate::validation::{
	validate_backoff, validate_endpoint, validate_max_attempts, validate_monitored_dir,
	validate_timeout_secs, ValidationError, Validator,
};

pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const ENV_STATE_DIR: &str = "AUTOBACKUP_STATE_DIR";
pub const ENV_ENDPOINT: &str = "AUTOBACKUP_ENDPOINT";
pub const ENV_API_KEY: &str = "AUTOBACKUP_API_KEY";
pub const ENV_LOG: &str = "AUTOBACKUP_LOG";

fn home_dir() -> Option<PathBuf> {
	std::env::var_os("HOME").filter(|h| !h.is_empty()).map(PathBuf::from)
}

/// Default state directory (~/.autobackup)
pub fn default_state_dir() -> PathBuf {
	home_dir().map(|h| h.join(".autobackup")).unwrap_or_else(|| PathBuf::from(".autobackup"))
}

/// Home-relative folders watched by default (XDG user directory names)
pub const DEFAULT_MONITORED_DIRS: [&str; 6] =
	["DCIM", "Pictures", "Videos", "Downloads", "Documents", "Music"];

fn monitored_dirs_under(home: &Path) -> Vec<PathBuf> {
	DEFAULT_MONITORED_DIRS.iter().map(|d| home.join(d)).collect()
}

fn default_monitored_dirs() -> Vec<PathBuf> {
	home_dir().map(|home| monitored_dirs_under(&home)).unwrap_or_default()
}

/// Configuration of the backup agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Directory holding the state database
	pub state_dir: PathBuf,

	/// Directories scanned for new files
	pub monitored_dirs: Vec<PathBuf>,

	/// Glob patterns, relative to each monitored directory, that are never scanned
	pub exclude_patterns: Vec<String>,

	/// Descend into symlinked directories
	pub follow_symlinks: bool,

	/// Maximum directory depth below a monitored directory
	pub max_depth: usize,

	/// Default log filter when RUST_LOG is unset
	pub log_level: String,

	pub remote: RemoteConfig,

	pub upload: UploadConfig,

	pub trigger: TriggerConfig,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			state_dir: default_state_dir(),
			monitored_dirs: default_monitored_dirs(),
			exclude_patterns: vec![],
			follow_symlinks: false,
			max_depth: 64,
			log_level: "info".to_string(),
			remote: RemoteConfig::default(),
			upload: UploadConfig::default(),
			trigger: TriggerConfig::default(),
		}
	}
}

/// Remote upload endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
	/// Server base URL
	pub endpoint: String,

	/// Path of the upload route below `endpoint`
	pub upload_path: String,

	/// Sent as `X-API-Key`
	pub api_key: Option<String>,

	/// Whole-request timeout
	pub timeout_secs: u64,

	pub user_agent: String,
}

impl Default for RemoteConfig {
	fn default() -> Self {
		RemoteConfig {
			endpoint: "http://localhost:800".to_string(),
			upload_path: "/api/upload".to_string(),
			api_key: None,
			timeout_secs: 30,
			user_agent: format!("autobackup/{}", env!("CARGO_PKG_VERSION")),
		}
	}
}

impl RemoteConfig {
	/// Full upload URL
	pub fn upload_url(&self) -> String {
		let base = self.endpoint.trim_end_matches('/');
		if self.upload_path.starts_with('/') {
			format!("{}{}", base, self.upload_path)
		} else {
			format!("{}/{}", base, self.upload_path)
		}
	}
}

/// Retry and pacing of uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
	/// Attempts per file, including the first
	pub max_attempts: u32,

	pub backoff_base_ms: u64,

	pub backoff_max_ms: u64,

	/// Pause between successive uploads
	pub inter_item_delay_ms: u64,

	/// Larger files are skipped
	pub max_file_size_mb: Option<u64>,
}

impl Default for UploadConfig {
	fn default() -> Self {
		UploadConfig {
			max_attempts: 3,
			backoff_base_ms: 1000,
			backoff_max_ms: 30_000,
			inter_item_delay_ms: 1000,
			max_file_size_mb: None,
		}
	}
}

/// Constraints checked by the periodic trigger before firing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
	pub require_network: bool,

	pub require_battery_not_low: bool,

	/// Report this network kind instead of probing interfaces
	pub assume_network: Option<NetworkKind>,
}

impl Default for TriggerConfig {
	fn default() -> Self {
		TriggerConfig { require_network: true, require_battery_not_low: true, assume_network: None }
	}
}

impl Config {
	/// Load configuration: defaults, then file, then environment
	///
	/// An explicitly given path must exist. Without one, the default location is
	/// used only if the file is there.
	pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
		let mut config = match path {
			Some(p) => Self::from_file(p)?,
			None => {
				let default_path = default_state_dir().join(CONFIG_FILE_NAME);
				if default_path.exists() {
					Self::from_file(&default_path)?
				} else {
					Config::default()
				}
			}
		};
		config.apply_env(|key| std::env::var(key).ok());
		config.validate()?;
		Ok(config)
	}

	pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
		let content = std::fs::read_to_string(path)
			.map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
		let config = Self::from_toml(&content, path)?;
		debug!("Loaded config from {}", path.display());
		Ok(config)
	}

	pub fn from_toml(content: &str, path: &Path) -> Result<Config, ConfigError> {
		toml::from_str(content)
			.map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })
	}

	/// Apply environment overrides; `lookup` returns a variable's value
	pub fn apply_env<F>(&mut self, lookup: F)
	where
		F: Fn(&str) -> Option<String>,
	{
		let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());
		if let Some(dir) = lookup(ENV_STATE_DIR) {
			self.state_dir = PathBuf::from(dir);
		}
		if let Some(endpoint) = lookup(ENV_ENDPOINT) {
			self.remote.endpoint = endpoint;
		}
		if let Some(key) = lookup(ENV_API_KEY) {
			self.remote.api_key = Some(key);
		}
		if let Some(level) = lookup(ENV_LOG) {
			self.log_level = level;
		}
	}

	/// Render as TOML
	pub fn to_toml(&self) -> Result<String, String> {
		toml::to_string_pretty(self).map_err(|e| e.to_string())
	}
}

impl Validator for Config {
	fn validate(&self) -> Result<(), ValidationError> {
		if self.state_dir.as_os_str().is_empty() {
			return Err(ValidationError::PathError("state_dir must not be empty".to_string()));
		}
		for dir in &self.monitored_dirs {
			validate_monitored_dir(dir)?;
		}
		if self.max_depth == 0 {
			return Err(ValidationError::ConfigError("max_depth must be at least 1".to_string()));
		}
		validate_endpoint(&self.remote.endpoint)?;
		validate_timeout_secs(self.remote.timeout_secs)?;
		validate_max_attempts(self.upload.max_attempts)?;
		validate_backoff(self.upload.backoff_base_ms, self.upload.backoff_max_ms)?;
		if self.upload.max_file_size_mb == Some(0) {
			return Err(ValidationError::ConfigError(
				"max_file_size_mb must be positive when set".to_string(),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_config_is_valid() {
		let config = Config::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.upload.max_attempts, 3);
		assert_eq!(config.remote.upload_url(), "http://localhost:800/api/upload");
	}

	#[test]
	fn test_default_monitored_dirs_follow_home() {
		let dirs = monitored_dirs_under(Path::new("/home/ana"));
		assert_eq!(dirs.len(), 6);
		assert_eq!(dirs[0], PathBuf::from("/home/ana/DCIM"));
		assert!(dirs.contains(&PathBuf::from("/home/ana/Videos")));
		assert!(dirs.contains(&PathBuf::from("/home/ana/Downloads")));
	}

	#[test]
	fn test_partial_toml_keeps_defaults() {
		let config = Config::from_toml(
			r#"
			monitored_dirs = ["/data/photos"]

			[upload]
			max_attempts = 5
			"#,
			Path::new("test.toml"),
		)
		.unwrap();

		assert_eq!(config.monitored_dirs, vec![PathBuf::from("/data/photos")]);
		assert_eq!(config.upload.max_attempts, 5);
		assert_eq!(config.upload.backoff_base_ms, 1000);
		assert!(config.trigger.require_network);
	}

	#[test]
	fn test_assume_network_parses() {
		let config = Config::from_toml(
			"[trigger]\nassume_network = \"cellular\"\n",
			Path::new("test.toml"),
		)
		.unwrap();
		assert_eq!(config.trigger.assume_network, Some(NetworkKind::Cellular));
	}

	#[test]
	fn test_env_overrides_file() {
		let mut config = Config::default();
		config.apply_env(|key| match key {
			ENV_ENDPOINT => Some("https://backup.example.org".to_string()),
			ENV_API_KEY => Some("secret".to_string()),
			ENV_LOG => Some(String::new()),
			_ => None,
		});
		assert_eq!(config.remote.endpoint, "https://backup.example.org");
		assert_eq!(config.remote.api_key.as_deref(), Some("secret"));
		assert_eq!(config.log_level, "info");
	}

	#[test]
	fn test_upload_url_without_leading_slash() {
		let remote = RemoteConfig {
			endpoint: "http://h:1".to_string(),
			upload_path: "up".to_string(),
			..RemoteConfig::default()
		};
		assert_eq!(remote.upload_url(), "http://h:1/up");
	}

	#[test]
	fn test_invalid_values_rejected() {
		let mut config = Config::default();
		config.monitored_dirs = vec![PathBuf::from("relative/dir")];
		assert!(config.validate().is_err());

		let mut config = Config::default();
		config.upload.max_attempts = 0;
		assert!(config.validate().is_err());

		let mut config = Config::default();
		config.remote.endpoint = "ftp://nope".to_string();
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_toml_roundtrip() {
		let mut config = Config::default();
		config.upload.max_file_size_mb = Some(100);
		let text = config.to_toml().unwrap();
		let parsed = Config::from_toml(&text, Path::new("x.toml")).unwrap();
		assert_eq!(parsed, config);
	}
}

// vim: ts=4
