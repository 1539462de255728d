//! Upload pipeline
//!
//! Consumes candidates strictly in order, one transfer at a time. A file's
//! fingerprint is committed only after the remote acknowledged it, so a file
//! that fails for any reason is rediscovered by the next scan. One file's
//! failure never stops the run. Cancellation is observed at file boundaries
//! and during the waits between attempts, never in the middle of a transfer.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::UploadConfig;
use crate::error::StoreError;
use crate::logging::*;
use crate::status::{StatusEvent, StatusReporter};
use crate::transfer::{Transfer, TransferOutcome};
use crate::types::{CandidateFile, DeviceIdentity, Fingerprint};

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total transfer attempts per file, including the first
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		RetryPolicy {
			max_attempts: 3,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(30),
		}
	}
}

impl RetryPolicy {
	/// Wait after the `attempt`-th failed attempt (1-based)
	pub fn backoff(&self, attempt: u32) -> Duration {
		let exp = attempt.saturating_sub(1).min(31);
		self.base_delay.saturating_mul(1u32 << exp).min(self.max_delay)
	}
}

/// Why a file ended up in the failure list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
	/// Every attempt returned a recoverable failure
	RetriesExhausted,
	/// The remote rejected the file
	Terminal,
	/// Uploaded, but the fingerprint could not be recorded
	Commit,
}

impl fmt::Display for FailureKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FailureKind::RetriesExhausted => write!(f, "retries exhausted"),
			FailureKind::Terminal => write!(f, "rejected"),
			FailureKind::Commit => write!(f, "commit failed"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
	pub path: PathBuf,
	pub kind: FailureKind,
	pub reason: String,
}

/// Summary of one pipeline run
///
/// `attempted` counts files that reached the transfer step. When the run was
/// cancelled while a file was waiting to retry, that file is counted as
/// attempted but in none of the failure counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutcome {
	pub attempted: usize,
	pub succeeded: usize,
	pub failed_exhausted: usize,
	pub failed_terminal: usize,
	pub failed_commit: usize,
	pub skipped: usize,
	pub cancelled: bool,
	pub failures: Vec<FileFailure>,
}

impl PipelineOutcome {
	pub fn failed(&self) -> usize {
		self.failed_exhausted + self.failed_terminal + self.failed_commit
	}

	fn record_failure(&mut self, path: PathBuf, kind: FailureKind, reason: String) {
		match kind {
			FailureKind::RetriesExhausted => self.failed_exhausted += 1,
			FailureKind::Terminal => self.failed_terminal += 1,
			FailureKind::Commit => self.failed_commit += 1,
		}
		self.failures.push(FileFailure { path, kind, reason });
	}
}

impl fmt::Display for PipelineOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Uploaded {}/{} file(s): {} failed after retries, {} rejected, {} not recorded, \
			 {} skipped",
			self.succeeded,
			self.attempted,
			self.failed_exhausted,
			self.failed_terminal,
			self.failed_commit,
			self.skipped
		)?;
		if self.cancelled {
			write!(f, " (cancelled)")?;
		}
		Ok(())
	}
}

enum FileResult {
	Uploaded,
	Exhausted(String),
	Rejected(String),
	Interrupted,
}

/// Sleep for `delay`; returns `false` if cancelled first
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
	if delay.is_zero() {
		return !cancel.is_cancelled();
	}
	tokio::select! {
		_ = cancel.cancelled() => false,
		_ = tokio::time::sleep(delay) => true,
	}
}

/// Serial uploader with retry and client-side pacing
#[derive(Debug, Clone)]
pub struct UploadPipeline {
	pub retry: RetryPolicy,
	/// Minimum gap between the end of one transfer and the start of the next
	pub inter_item_delay: Duration,
	/// Files larger than this are skipped
	pub max_file_size: Option<u64>,
}

impl Default for UploadPipeline {
	fn default() -> Self {
		UploadPipeline {
			retry: RetryPolicy::default(),
			inter_item_delay: Duration::from_secs(1),
			max_file_size: None,
		}
	}
}

impl UploadPipeline {
	pub fn from_config(config: &UploadConfig) -> Self {
		UploadPipeline {
			retry: RetryPolicy {
				max_attempts: config.max_attempts,
				base_delay: Duration::from_millis(config.backoff_base_ms),
				max_delay: Duration::from_millis(config.backoff_max_ms),
			},
			inter_item_delay: Duration::from_millis(config.inter_item_delay_ms),
			max_file_size: config.max_file_size_mb.map(|mb| mb.saturating_mul(1024 * 1024)),
		}
	}

	/// Reason to drop a candidate before transferring it, if any
	async fn precheck(&self, file: &CandidateFile) -> Option<String> {
		let meta = match tokio::fs::metadata(&file.path).await {
			Ok(m) => m,
			Err(e) => return Some(format!("no longer available ({})", e)),
		};
		if !meta.is_file() {
			return Some("no longer a regular file".to_string());
		}
		if meta.len() == 0 {
			return Some("empty file".to_string());
		}
		match self.max_file_size {
			Some(limit) if meta.len() > limit => {
				Some(format!("{} bytes exceeds the {} byte limit", meta.len(), limit))
			}
			_ => None,
		}
	}

	async fn upload_one(
		&self,
		file: &CandidateFile,
		identity: &DeviceIdentity,
		transfer: &dyn Transfer,
		report: &dyn StatusReporter,
		cancel: &CancellationToken,
	) -> FileResult {
		let max_attempts = self.retry.max_attempts.max(1);
		let mut attempt = 1;
		loop {
			report.on_event(&StatusEvent::Uploading {
				path: file.path.clone(),
				attempt,
				max_attempts,
			});

			match transfer.transfer(file, identity).await {
				TransferOutcome::Success => return FileResult::Uploaded,
				TransferOutcome::Terminal { reason } => return FileResult::Rejected(reason),
				TransferOutcome::Recoverable { reason } => {
					if attempt >= max_attempts {
						return FileResult::Exhausted(reason);
					}
					let delay = self.retry.backoff(attempt);
					debug!("Attempt {} for {} failed: {}", attempt, file.path.display(), reason);
					report.on_event(&StatusEvent::Retrying {
						path: file.path.clone(),
						attempt,
						delay,
						reason,
					});
					if !pause(delay, cancel).await {
						return FileResult::Interrupted;
					}
					attempt += 1;
				}
			}
		}
	}

	/// Upload `candidates` in order
	///
	/// `commit` records a fingerprint after a confirmed transfer. A commit
	/// failure is recorded against that file and the run continues.
	pub async fn run<I, C>(
		&self,
		candidates: I,
		identity: &DeviceIdentity,
		transfer: &dyn Transfer,
		commit: C,
		report: &dyn StatusReporter,
		cancel: &CancellationToken,
	) -> PipelineOutcome
	where
		I: IntoIterator<Item = CandidateFile>,
		C: Fn(&Fingerprint) -> Result<(), StoreError>,
	{
		let mut outcome = PipelineOutcome::default();
		let mut committed: HashSet<Fingerprint> = HashSet::new();
		let mut transferred_before = false;

		for file in candidates {
			if cancel.is_cancelled() {
				outcome.cancelled = true;
				break;
			}

			let skip_reason = if committed.contains(&file.fingerprint) {
				Some("same content already uploaded in this run".to_string())
			} else {
				self.precheck(&file).await
			};
			if let Some(reason) = skip_reason {
				debug!("Skipping {}: {}", file.path.display(), reason);
				outcome.skipped += 1;
				report.on_event(&StatusEvent::Skipped { path: file.path.clone(), reason });
				continue;
			}

			if transferred_before && !pause(self.inter_item_delay, cancel).await {
				outcome.cancelled = true;
				break;
			}
			transferred_before = true;
			outcome.attempted += 1;

			match self.upload_one(&file, identity, transfer, report, cancel).await {
				FileResult::Uploaded => match commit(&file.fingerprint) {
					Ok(()) => {
						outcome.succeeded += 1;
						committed.insert(file.fingerprint.clone());
						report.on_event(&StatusEvent::Uploaded { path: file.path.clone() });
					}
					Err(e) => {
						warn!("Uploaded {} but could not record it: {}", file.path.display(), e);
						let reason = e.to_string();
						self.fail(&mut outcome, report, file.path, FailureKind::Commit, reason);
					}
				},
				FileResult::Exhausted(reason) => {
					let kind = FailureKind::RetriesExhausted;
					self.fail(&mut outcome, report, file.path, kind, reason);
				}
				FileResult::Rejected(reason) => {
					self.fail(&mut outcome, report, file.path, FailureKind::Terminal, reason);
				}
				FileResult::Interrupted => {
					info!("Cancelled while retrying {}", file.path.display());
					outcome.cancelled = true;
					break;
				}
			}
		}

		report.on_event(&StatusEvent::Finished(outcome.clone()));
		outcome
	}

	fn fail(
		&self,
		outcome: &mut PipelineOutcome,
		report: &dyn StatusReporter,
		path: PathBuf,
		kind: FailureKind,
		reason: String,
	) {
		report.on_event(&StatusEvent::Failed { path: path.clone(), kind, reason: reason.clone() });
		outcome.record_failure(path, kind, reason);
	}
}


// vim: ts=4
