//! Error types for backup operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::validation::ValidationError;

/// Main error type for agent operations
#[derive(Debug)]
pub enum BackupError {
	/// I/O error
	Io(io::Error),

	/// State store error (nested)
	State(StoreError),

	/// Configuration error (nested)
	Config(ConfigError),

	/// HTTP client could not be set up
	Transport { message: String },

	/// A background task panicked or was cancelled by the runtime
	Task { message: String },

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for BackupError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BackupError::Io(e) => write!(f, "I/O error: {}", e),
			BackupError::State(e) => write!(f, "State error: {}", e),
			BackupError::Config(e) => write!(f, "Configuration error: {}", e),
			BackupError::Transport { message } => write!(f, "Transport error: {}", message),
			BackupError::Task { message } => write!(f, "Background task failed: {}", message),
			BackupError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for BackupError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			BackupError::Io(e) => Some(e),
			BackupError::State(e) => Some(e),
			BackupError::Config(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for BackupError {
	fn from(e: io::Error) -> Self {
		BackupError::Io(e)
	}
}

impl From<StoreError> for BackupError {
	fn from(e: StoreError) -> Self {
		BackupError::State(e)
	}
}

impl From<ConfigError> for BackupError {
	fn from(e: ConfigError) -> Self {
		BackupError::Config(e)
	}
}

impl From<tokio::task::JoinError> for BackupError {
	fn from(e: tokio::task::JoinError) -> Self {
		BackupError::Task { message: e.to_string() }
	}
}

impl From<String> for BackupError {
	fn from(e: String) -> Self {
		BackupError::Other { message: e }
	}
}

/// State store errors
///
/// A failed write never touches fingerprints committed by earlier transactions.
#[derive(Debug)]
pub enum StoreError {
	/// Failed to open or create the database file
	Open { path: PathBuf, source: redb::DatabaseError },

	/// The database is held open by another store instance or process
	Busy { path: PathBuf },

	/// Storage backend failure during a transaction
	Backend { source: redb::Error },

	/// A stored value could not be decoded
	Corrupted { message: String },

	/// The write was refused because the value is invalid
	Rejected { reason: ValidationError },
}

impl fmt::Display for StoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StoreError::Open { path, source } => {
				write!(f, "Failed to open state database {}: {}", path.display(), source)
			}
			StoreError::Busy { path } => write!(
				f,
				"State database {} is in use by another autobackup process",
				path.display()
			),
			StoreError::Backend { source } => write!(f, "State database failure: {}", source),
			StoreError::Corrupted { message } => write!(f, "State corrupted: {}", message),
			StoreError::Rejected { reason } => write!(f, "Write rejected: {}", reason),
		}
	}
}

impl Error for StoreError {}

impl From<redb::Error> for StoreError {
	fn from(e: redb::Error) -> Self {
		StoreError::Backend { source: e }
	}
}

impl From<redb::TransactionError> for StoreError {
	fn from(e: redb::TransactionError) -> Self {
		StoreError::Backend { source: e.into() }
	}
}

impl From<redb::TableError> for StoreError {
	fn from(e: redb::TableError) -> Self {
		StoreError::Backend { source: e.into() }
	}
}

impl From<redb::StorageError> for StoreError {
	fn from(e: redb::StorageError) -> Self {
		StoreError::Backend { source: e.into() }
	}
}

impl From<redb::CommitError> for StoreError {
	fn from(e: redb::CommitError) -> Self {
		StoreError::Backend { source: e.into() }
	}
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
	/// Config file could not be read
	Read { path: PathBuf, source: io::Error },

	/// Config file is not valid TOML for the expected shape
	Parse { path: PathBuf, message: String },

	/// Config parsed but failed validation
	Invalid(ValidationError),
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::Read { path, source } => {
				write!(f, "Cannot read config {}: {}", path.display(), source)
			}
			ConfigError::Parse { path, message } => {
				write!(f, "Cannot parse config {}: {}", path.display(), message)
			}
			ConfigError::Invalid(e) => write!(f, "{}", e),
		}
	}
}

impl Error for ConfigError {}

impl From<ValidationError> for ConfigError {
	fn from(e: ValidationError) -> Self {
		ConfigError::Invalid(e)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_store_error_wraps_into_backup_error() {
		let err: BackupError = StoreError::Corrupted { message: "bad flag".to_string() }.into();
		assert!(matches!(err, BackupError::State(_)));
		assert!(err.to_string().contains("bad flag"));
	}

	#[test]
	fn test_rejected_display_carries_reason() {
		let err = StoreError::Rejected {
			reason: ValidationError::ConfigError("interval too short".to_string()),
		};
		assert!(err.to_string().contains("interval too short"));
	}
}

// vim: ts=4
