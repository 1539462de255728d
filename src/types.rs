//! Core data types shared by the scanner, pipeline and state store

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::scanner::FileCategory;
use crate::validation::{validate_scan_interval, ValidationError, Validator, MIN_SCAN_INTERVAL_MS};

/// Identity of this install, attached to every upload
///
/// Generated once by the state store and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
	pub fn new(id: impl Into<String>) -> Self {
		DeviceIdentity(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for DeviceIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// How a fingerprint was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerprintStrength {
	/// SHA-256 of the full file content
	Strong,
	/// Derived from name, size and mtime because the content could not be read
	Weak,
}

/// Content fingerprint used for the "already uploaded" test
///
/// Equality and hashing only look at the value: a weak fingerprint is treated
/// identically to a strong one for set membership.
#[derive(Debug, Clone)]
pub struct Fingerprint {
	value: String,
	strength: FingerprintStrength,
}

impl Fingerprint {
	pub fn strong(value: impl Into<String>) -> Self {
		Fingerprint { value: value.into(), strength: FingerprintStrength::Strong }
	}

	pub fn weak(value: impl Into<String>) -> Self {
		Fingerprint { value: value.into(), strength: FingerprintStrength::Weak }
	}

	pub fn as_str(&self) -> &str {
		&self.value
	}

	pub fn strength(&self) -> FingerprintStrength {
		self.strength
	}

	pub fn is_weak(&self) -> bool {
		self.strength == FingerprintStrength::Weak
	}
}

impl PartialEq for Fingerprint {
	fn eq(&self, other: &Self) -> bool {
		self.value == other.value
	}
}

impl Eq for Fingerprint {}

impl std::hash::Hash for Fingerprint {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.value.hash(state);
	}
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.value)
	}
}

/// A file found by a scan that is not yet in the uploaded set
///
/// Lives for one cycle only; never persisted.
#[derive(Debug, Clone)]
pub struct CandidateFile {
	pub path: PathBuf,
	pub size: u64,
	pub modified: SystemTime,
	pub fingerprint: Fingerprint,
	pub category: Option<FileCategory>,
}

impl CandidateFile {
	/// File name for display and upload metadata
	pub fn name(&self) -> String {
		self.path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| self.path.display().to_string())
	}
}

/// Per-category backup toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryToggles {
	pub images: bool,
	pub video: bool,
	pub documents: bool,
	pub audio: bool,
	pub archives: bool,
	pub packages: bool,
}

impl Default for CategoryToggles {
	fn default() -> Self {
		CategoryToggles {
			images: true,
			video: true,
			documents: true,
			audio: true,
			archives: true,
			packages: true,
		}
	}
}

impl CategoryToggles {
	pub fn is_enabled(&self, category: FileCategory) -> bool {
		match category {
			FileCategory::Image => self.images,
			FileCategory::Video => self.video,
			FileCategory::Document => self.documents,
			FileCategory::Audio => self.audio,
			FileCategory::Archive => self.archives,
			FileCategory::Package => self.packages,
		}
	}

	fn flag_mut(&mut self, category: FileCategory) -> &mut bool {
		match category {
			FileCategory::Image => &mut self.images,
			FileCategory::Video => &mut self.video,
			FileCategory::Document => &mut self.documents,
			FileCategory::Audio => &mut self.audio,
			FileCategory::Archive => &mut self.archives,
			FileCategory::Package => &mut self.packages,
		}
	}
}

pub const KEY_AUTO_BACKUP: &str = "auto_backup";
pub const KEY_WIFI_ONLY: &str = "wifi_only";
pub const KEY_SCAN_INTERVAL: &str = "scan_interval_ms";
const CATEGORY_PREFIX: &str = "category.";

/// User settings, owned by the state store and read-only to the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
	pub auto_backup_enabled: bool,
	pub wifi_only: bool,
	pub scan_interval_ms: i64,
	pub categories: CategoryToggles,
}

impl Default for Settings {
	fn default() -> Self {
		Settings {
			auto_backup_enabled: true,
			wifi_only: false,
			scan_interval_ms: MIN_SCAN_INTERVAL_MS,
			categories: CategoryToggles::default(),
		}
	}
}

impl Settings {
	/// Flatten into the key/value layout used by the state store
	pub fn to_entries(&self) -> Vec<(String, String)> {
		let mut entries = vec![
			(KEY_AUTO_BACKUP.to_string(), self.auto_backup_enabled.to_string()),
			(KEY_WIFI_ONLY.to_string(), self.wifi_only.to_string()),
			(KEY_SCAN_INTERVAL.to_string(), self.scan_interval_ms.to_string()),
		];
		for category in FileCategory::ALL {
			entries.push((
				format!("{}{}", CATEGORY_PREFIX, category.key()),
				self.categories.is_enabled(category).to_string(),
			));
		}
		entries
	}

	/// Rebuild from stored key/value pairs; missing keys keep their defaults
	pub fn from_entries<I>(entries: I) -> Result<Self, String>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		let mut settings = Settings::default();
		for (key, value) in entries {
			settings.apply(&key, &value)?;
		}
		Ok(settings)
	}

	/// Set a single setting from its textual key and value
	pub fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
		match key {
			KEY_AUTO_BACKUP => self.auto_backup_enabled = parse_flag(key, value)?,
			KEY_WIFI_ONLY => self.wifi_only = parse_flag(key, value)?,
			KEY_SCAN_INTERVAL => {
				self.scan_interval_ms = value
					.trim()
					.parse()
					.map_err(|_| format!("{}: expected milliseconds, got '{}'", key, value))?
			}
			_ => {
				let category = key
					.strip_prefix(CATEGORY_PREFIX)
					.and_then(FileCategory::from_key)
					.ok_or_else(|| format!("Unknown setting: {}", key))?;
				*self.categories.flag_mut(category) = parse_flag(key, value)?;
			}
		}
		Ok(())
	}

	/// Names accepted by [`Settings::apply`]
	pub fn keys() -> Vec<String> {
		Settings::default().to_entries().into_iter().map(|(k, _)| k).collect()
	}
}

impl Validator for Settings {
	fn validate(&self) -> Result<(), ValidationError> {
		validate_scan_interval(self.scan_interval_ms)
	}
}

fn parse_flag(key: &str, value: &str) -> Result<bool, String> {
	match value.trim().to_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Ok(true),
		"false" | "0" | "no" | "off" => Ok(false),
		_ => Err(format!("{}: expected true/false, got '{}'", key, value)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;

	#[test]
	fn test_weak_and_strong_fingerprints_compare_by_value() {
		let strong = Fingerprint::strong("abc");
		let weak = Fingerprint::weak("abc");
		assert_eq!(strong, weak);
		assert!(weak.is_weak());

		let mut set = HashSet::new();
		set.insert(strong);
		assert!(set.contains(&weak));
	}

	#[test]
	fn test_settings_entries_roundtrip_keeps_changes() {
		let mut settings = Settings::default();
		settings.wifi_only = true;
		settings.categories.packages = false;

		let restored = Settings::from_entries(settings.to_entries()).unwrap();
		assert_eq!(restored, settings);
	}

	#[test]
	fn test_settings_missing_keys_use_defaults() {
		let restored =
			Settings::from_entries(vec![(KEY_WIFI_ONLY.to_string(), "true".to_string())]).unwrap();
		assert!(restored.wifi_only);
		assert!(restored.auto_backup_enabled);
		assert_eq!(restored.scan_interval_ms, MIN_SCAN_INTERVAL_MS);
	}

	#[test]
	fn test_settings_apply_rejects_unknown_and_malformed() {
		let mut settings = Settings::default();
		assert!(settings.apply("colour", "blue").is_err());
		assert!(settings.apply(KEY_AUTO_BACKUP, "maybe").is_err());
		assert!(settings.apply(KEY_SCAN_INTERVAL, "soon").is_err());
		assert!(settings.apply("category.video", "off").is_ok());
		assert!(!settings.categories.video);
	}

	#[test]
	fn test_settings_validation() {
		let mut settings = Settings::default();
		assert!(settings.validate().is_ok());
		settings.scan_interval_ms = 1000;
		assert!(settings.validate().is_err());
	}
}

// vim: ts=4
