//! Pattern-based exclusion using glob patterns
//!
//! Patterns are matched against paths relative to the monitored root.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fmt;
use std::path::Path;

/// Errors that can occur while compiling exclusion patterns
#[derive(Debug)]
pub struct PatternError(pub String);

impl fmt::Display for PatternError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Invalid exclusion pattern: {}", self.0)
	}
}

impl std::error::Error for PatternError {}

/// Pattern matcher using globset for efficient matching
#[derive(Debug, Clone)]
pub struct PatternMatcher {
	/// Compiled user exclusion patterns
	exclude_set: GlobSet,

	/// Always-excluded patterns (built-in)
	always_exclude: GlobSet,
}

impl PatternMatcher {
	/// Create a new pattern matcher
	pub fn new(exclude_patterns: &[String]) -> Result<Self, PatternError> {
		let always_exclude = Self::build_always_excluded()?;
		let exclude_set = Self::build_glob_set(exclude_patterns)?;
		Ok(Self { exclude_set, always_exclude })
	}

	/// Build the always-excluded patterns
	fn build_always_excluded() -> Result<GlobSet, PatternError> {
		let patterns = vec![
			"**/.thumbnails",  // Android gallery cache
			"**/.thumbnails/**",
			"**/.trashed-*",   // Android trash
			"**/.Trash-*",     // Linux trash
			"**/lost+found",   // Linux filesystem recovery
			"**/.DS_Store",    // macOS cruft
			"**/Thumbs.db",    // Windows cruft
			"**/*.part",       // Partial downloads
			"**/*.crdownload", // Partial downloads
		];

		Self::build_glob_set(&patterns.into_iter().map(String::from).collect::<Vec<_>>())
	}

	/// Build a GlobSet from patterns
	fn build_glob_set(patterns: &[String]) -> Result<GlobSet, PatternError> {
		let mut builder = GlobSetBuilder::new();

		for pattern in patterns {
			let glob =
				Glob::new(pattern).map_err(|e| PatternError(format!("{}: {}", pattern, e)))?;
			builder.add(glob);
		}

		builder
			.build()
			.map_err(|e| PatternError(format!("Failed to build pattern set: {}", e)))
	}

	/// Check if a root-relative path is excluded by any pattern
	pub fn is_excluded(&self, path: &Path) -> bool {
		self.always_exclude.is_match(path) || self.exclude_set.is_match(path)
	}
}

impl Default for PatternMatcher {
	fn default() -> Self {
		PatternMatcher {
			exclude_set: GlobSet::empty(),
			always_exclude: Self::build_always_excluded().unwrap_or_else(|_| GlobSet::empty()),
		}
	}
}


// vim: ts=4
