//! Remote transfer boundary
//!
//! The pipeline depends only on the tri-state [`TransferOutcome`]; how bytes
//! reach the remote store is up to the [`Transfer`] implementation.

mod http;

pub use http::{classify_status, HttpTransfer, UploadResponse};

use async_trait::async_trait;
use std::fmt;

use crate::types::{CandidateFile, DeviceIdentity};

/// Result of one transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
	/// The remote acknowledged the file
	Success,

	/// Transient failure (network, timeout, 5xx); worth retrying
	Recoverable { reason: String },

	/// Definitive rejection (auth, quota, 4xx); retrying cannot help
	Terminal { reason: String },
}

impl TransferOutcome {
	pub fn recoverable(reason: impl Into<String>) -> Self {
		TransferOutcome::Recoverable { reason: reason.into() }
	}

	pub fn terminal(reason: impl Into<String>) -> Self {
		TransferOutcome::Terminal { reason: reason.into() }
	}

	pub fn is_success(&self) -> bool {
		matches!(self, TransferOutcome::Success)
	}
}

impl fmt::Display for TransferOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransferOutcome::Success => write!(f, "success"),
			TransferOutcome::Recoverable { reason } => write!(f, "recoverable failure: {}", reason),
			TransferOutcome::Terminal { reason } => write!(f, "terminal failure: {}", reason),
		}
	}
}

/// Uploads one file to the remote store
///
/// Implementations never panic or return errors; every failure maps onto a
/// [`TransferOutcome`] variant.
#[async_trait]
pub trait Transfer: Send + Sync {
	async fn transfer(&self, file: &CandidateFile, identity: &DeviceIdentity) -> TransferOutcome;
}


// vim: ts=4
