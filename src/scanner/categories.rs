//! File categories and the extension allow-list

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::types::CategoryToggles;

/// Broad content category, sent along with each upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileCategory {
	Image,
	Video,
	Document,
	Audio,
	Archive,
	Package,
}

impl FileCategory {
	pub const ALL: [FileCategory; 6] = [
		FileCategory::Image,
		FileCategory::Video,
		FileCategory::Document,
		FileCategory::Audio,
		FileCategory::Archive,
		FileCategory::Package,
	];

	/// Lowercase extensions (without the dot) belonging to this category
	pub fn extensions(self) -> &'static [&'static str] {
		match self {
			FileCategory::Image => &["jpg", "jpeg", "png", "gif", "bmp", "webp"],
			FileCategory::Video => &["mp4", "mkv", "avi", "mov", "wmv", "flv"],
			FileCategory::Document => {
				&["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt"]
			}
			FileCategory::Audio => &["mp3", "wav", "aac", "flac", "m4a"],
			FileCategory::Archive => &["zip", "rar", "7z"],
			FileCategory::Package => &["apk"],
		}
	}

	/// Settings key suffix (`category.<key>`)
	pub fn key(self) -> &'static str {
		match self {
			FileCategory::Image => "images",
			FileCategory::Video => "video",
			FileCategory::Document => "documents",
			FileCategory::Audio => "audio",
			FileCategory::Archive => "archives",
			FileCategory::Package => "packages",
		}
	}

	pub fn from_key(key: &str) -> Option<FileCategory> {
		FileCategory::ALL.into_iter().find(|c| c.key() == key)
	}

	pub fn from_extension(ext: &str) -> Option<FileCategory> {
		let ext = normalize_extension(ext);
		FileCategory::ALL.into_iter().find(|c| c.extensions().contains(&ext.as_str()))
	}
}

impl fmt::Display for FileCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.key())
	}
}

fn normalize_extension(ext: &str) -> String {
	ext.trim_start_matches('.').to_lowercase()
}

/// Lowercased extension of a path, if it has one
pub fn extension_of(path: &Path) -> Option<String> {
	path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Allow-list of extensions consulted before any file is fingerprinted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
	allowed: BTreeSet<String>,
}

impl ExtensionFilter {
	/// Build from an explicit set; entries may carry a leading dot and any case
	pub fn new<I, S>(extensions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		ExtensionFilter {
			allowed: extensions.into_iter().map(|e| normalize_extension(e.as_ref())).collect(),
		}
	}

	/// Union of the extensions of every enabled category
	pub fn from_categories(toggles: &CategoryToggles) -> Self {
		ExtensionFilter::new(
			FileCategory::ALL
				.into_iter()
				.filter(|c| toggles.is_enabled(*c))
				.flat_map(|c| c.extensions().iter().copied()),
		)
	}

	pub fn allows(&self, path: &Path) -> bool {
		match extension_of(path) {
			Some(ext) => self.allowed.contains(&ext),
			None => false,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.allowed.is_empty()
	}

	pub fn len(&self) -> usize {
		self.allowed.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_extension_match_is_case_insensitive() {
		let filter = ExtensionFilter::from_categories(&CategoryToggles::default());
		assert!(filter.allows(Path::new("/dcim/IMG_0001.JPG")));
		assert!(filter.allows(Path::new("report.Pdf")));
		assert!(!filter.allows(Path::new("note.tmp")));
		assert!(!filter.allows(Path::new("Makefile")));
	}

	#[test]
	fn test_disabled_category_is_not_allowed() {
		let toggles = CategoryToggles { video: false, ..CategoryToggles::default() };
		let filter = ExtensionFilter::from_categories(&toggles);
		assert!(!filter.allows(Path::new("clip.mp4")));
		assert!(filter.allows(Path::new("photo.png")));
	}

	#[test]
	fn test_explicit_set_accepts_dotted_entries() {
		let filter = ExtensionFilter::new([".JPG", "txt"]);
		assert_eq!(filter.len(), 2);
		assert!(filter.allows(Path::new("a.jpg")));
		assert!(filter.allows(Path::new("b.TXT")));
		assert!(!filter.allows(Path::new("c.png")));
	}

	#[test]
	fn test_category_lookup() {
		assert_eq!(FileCategory::from_extension("MKV"), Some(FileCategory::Video));
		assert_eq!(FileCategory::from_extension(".apk"), Some(FileCategory::Package));
		assert_eq!(FileCategory::from_extension("tmp"), None);
		assert_eq!(FileCategory::from_key("archives"), Some(FileCategory::Archive));
	}
}

// vim: ts=4
