//! Path validation functions

use std::path::{Component, Path};

use super::ValidationError;

/// Check if a path is safe (no parent directory references)
pub fn is_path_safe(path: &Path) -> bool {
	!path.components().any(|c| matches!(c, Component::ParentDir))
}

/// Validate a monitored directory entry from the configuration
///
/// Monitored roots must be absolute and free of `..` components so that the
/// exclusion patterns, which are matched relative to the root, stay meaningful.
/// Whether the directory exists is checked at scan time, not here.
pub fn validate_monitored_dir(path: &Path) -> Result<(), ValidationError> {
	if !path.is_absolute() {
		return Err(ValidationError::PathError(format!(
			"Monitored directory must be absolute: {:?}",
			path
		)));
	}
	if !is_path_safe(path) {
		return Err(ValidationError::PathError(format!(
			"Monitored directory contains parent directory reference (..): {:?}",
			path
		)));
	}
	Ok(())
}


// vim: ts=4
