//! Status reporting
//!
//! The pipeline and scheduler emit [`StatusEvent`]s to a [`StatusReporter`].
//! Delivery is fire-and-forget: a reporter cannot influence the cycle.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::*;
use crate::pipeline::{FailureKind, PipelineOutcome};
use crate::scheduler::SkipReason;

/// Progress event emitted during a cycle
#[derive(Debug, Clone)]
pub enum StatusEvent {
	/// A triggered cycle passed the settings gate
	CycleStarted,

	/// A triggered cycle exited without scanning
	CycleSkipped { reason: SkipReason },

	/// The cycle could not run to completion
	CycleFailed { message: String },

	/// Scan complete; `candidates` files queued for upload
	ScanFinished { candidates: usize },

	/// Transfer attempt starting
	Uploading { path: PathBuf, attempt: u32, max_attempts: u32 },

	/// Transfer acknowledged and fingerprint committed
	Uploaded { path: PathBuf },

	/// Recoverable failure, another attempt follows after `delay`
	Retrying { path: PathBuf, attempt: u32, delay: Duration, reason: String },

	/// Candidate dropped before transfer
	Skipped { path: PathBuf, reason: String },

	/// Candidate given up on for this run
	Failed { path: PathBuf, kind: FailureKind, reason: String },

	/// Pipeline summary
	Finished(PipelineOutcome),
}

impl fmt::Display for StatusEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StatusEvent::CycleStarted => write!(f, "Backup cycle started"),
			StatusEvent::CycleSkipped { reason } => write!(f, "Backup cycle skipped: {}", reason),
			StatusEvent::CycleFailed { message } => write!(f, "Backup cycle failed: {}", message),
			StatusEvent::ScanFinished { candidates } => {
				write!(f, "Found {} new file(s)", candidates)
			}
			StatusEvent::Uploading { path, attempt, max_attempts } => {
				write!(f, "Uploading {} (attempt {}/{})", path.display(), attempt, max_attempts)
			}
			StatusEvent::Uploaded { path } => write!(f, "Uploaded {}", path.display()),
			StatusEvent::Retrying { path, attempt, delay, reason } => write!(
				f,
				"Attempt {} for {} failed ({}), retrying in {:?}",
				attempt,
				path.display(),
				reason,
				delay
			),
			StatusEvent::Skipped { path, reason } => {
				write!(f, "Skipped {}: {}", path.display(), reason)
			}
			StatusEvent::Failed { path, kind, reason } => {
				write!(f, "Failed {} ({}): {}", path.display(), kind, reason)
			}
			StatusEvent::Finished(outcome) => write!(f, "{}", outcome),
		}
	}
}

/// Receives status events
pub trait StatusReporter: Send + Sync {
	fn on_event(&self, event: &StatusEvent);
}

/// Reporter that drops every event
pub struct NoStatus;

impl StatusReporter for NoStatus {
	fn on_event(&self, _event: &StatusEvent) {}
}

/// Reporter that writes every event to the log
pub struct LogStatus;

impl StatusReporter for LogStatus {
	fn on_event(&self, event: &StatusEvent) {
		match event {
			StatusEvent::Failed { .. } | StatusEvent::CycleFailed { .. } => warn!("{}", event),
			StatusEvent::Uploading { .. } | StatusEvent::Skipped { .. } => debug!("{}", event),
			_ => info!("{}", event),
		}
	}
}

impl<F> StatusReporter for F
where
	F: Fn(&StatusEvent) + Send + Sync,
{
	fn on_event(&self, event: &StatusEvent) {
		self(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	#[test]
	fn test_closure_reporter_receives_events() {
		let seen = Mutex::new(Vec::new());
		let reporter = |e: &StatusEvent| seen.lock().unwrap().push(e.to_string());
		reporter.on_event(&StatusEvent::ScanFinished { candidates: 2 });
		reporter.on_event(&StatusEvent::Uploaded { path: PathBuf::from("/p/photo.jpg") });

		let seen = seen.into_inner().unwrap();
		assert_eq!(seen, vec!["Found 2 new file(s)", "Uploaded /p/photo.jpg"]);
	}

	#[test]
	fn test_skip_reason_in_message() {
		let event = StatusEvent::CycleSkipped { reason: SkipReason::WifiRequired };
		assert!(event.to_string().contains("Wi-Fi"));
	}
}

// vim: ts=4
