//! Upload pipeline against mock transfers and a real state store

use async_trait::async_trait;
use autobackup::error::StoreError;
use autobackup::pipeline::{FailureKind, RetryPolicy, UploadPipeline};
use autobackup::scanner::scan;
use autobackup::status::{NoStatus, StatusEvent};
use autobackup::store::StateStore;
use autobackup::transfer::{Transfer, TransferOutcome};
use autobackup::types::{CandidateFile, DeviceIdentity, Fingerprint};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Transfer that always answers the same way and records what it saw
struct Always {
	outcome: TransferOutcome,
	calls: AtomicUsize,
	seen: Mutex<Vec<(String, String)>>,
}

impl Always {
	fn new(outcome: TransferOutcome) -> Self {
		Always { outcome, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) }
	}
}

#[async_trait]
impl Transfer for Always {
	async fn transfer(&self, file: &CandidateFile, identity: &DeviceIdentity) -> TransferOutcome {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.seen.lock().unwrap().push((file.name(), identity.to_string()));
		self.outcome.clone()
	}
}

fn pipeline(max_attempts: u32) -> UploadPipeline {
	UploadPipeline {
		retry: RetryPolicy {
			max_attempts,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(4),
		},
		inter_item_delay: Duration::ZERO,
		max_file_size: None,
	}
}

fn candidates(dir: &TempDir, files: &[(&str, &[u8])]) -> Vec<CandidateFile> {
	for (name, content) in files {
		fs::write(dir.path().join(name), content).unwrap();
	}
	scan(&[dir.path().to_path_buf()], ["jpg", "mp4"], |_| false)
}

#[tokio::test]
async fn test_always_recoverable_hits_attempt_bound_without_commit() {
	let files = TempDir::new().unwrap();
	let state = TempDir::new().unwrap();
	let store = StateStore::open_in(state.path()).unwrap();
	let transfer = Always::new(TransferOutcome::recoverable("HTTP 503"));

	let outcome = pipeline(3)
		.run(
			candidates(&files, &[("a.jpg", b"a")]),
			&DeviceIdentity::new("dev"),
			&transfer,
			|f: &Fingerprint| store.add_fingerprint(f).map(|_| ()),
			&NoStatus,
			&CancellationToken::new(),
		)
		.await;

	assert_eq!(transfer.calls.load(Ordering::SeqCst), 3);
	assert_eq!(outcome.failed_exhausted, 1);
	assert_eq!(outcome.succeeded, 0);
	assert_eq!(outcome.failures[0].kind, FailureKind::RetriesExhausted);
	assert_eq!(store.fingerprint_count().unwrap(), 0);
}

#[tokio::test]
async fn test_success_commits_in_candidate_order() {
	let files = TempDir::new().unwrap();
	let state = TempDir::new().unwrap();
	let store = StateStore::open_in(state.path()).unwrap();
	let transfer = Always::new(TransferOutcome::Success);
	let list = candidates(&files, &[("b.jpg", b"b"), ("a.jpg", b"a"), ("c.mp4", b"c")]);
	let expected: Vec<String> = list.iter().map(|c| c.name()).collect();

	let outcome = pipeline(3)
		.run(
			list,
			&DeviceIdentity::new("dev-1"),
			&transfer,
			|f: &Fingerprint| store.add_fingerprint(f).map(|_| ()),
			&NoStatus,
			&CancellationToken::new(),
		)
		.await;

	assert_eq!(outcome.succeeded, 3);
	assert_eq!(store.fingerprint_count().unwrap(), 3);
	let seen = transfer.seen.into_inner().unwrap();
	let names: Vec<String> = seen.iter().map(|(n, _)| n.clone()).collect();
	assert_eq!(names, expected);
	assert!(seen.iter().all(|(_, id)| id == "dev-1"));
}

#[tokio::test]
async fn test_terminal_failure_leaves_store_untouched() {
	let files = TempDir::new().unwrap();
	let transfer = Always::new(TransferOutcome::terminal("HTTP 401"));
	let commits = AtomicUsize::new(0);

	let outcome = pipeline(3)
		.run(
			candidates(&files, &[("a.jpg", b"a"), ("b.jpg", b"b")]),
			&DeviceIdentity::new("dev"),
			&transfer,
			|_: &Fingerprint| {
				commits.fetch_add(1, Ordering::SeqCst);
				Ok::<(), StoreError>(())
			},
			&NoStatus,
			&CancellationToken::new(),
		)
		.await;

	assert_eq!(transfer.calls.load(Ordering::SeqCst), 2);
	assert_eq!(outcome.failed_terminal, 2);
	assert_eq!(commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_inter_item_delay_paces_uploads() {
	let files = TempDir::new().unwrap();
	let transfer = Always::new(TransferOutcome::Success);
	let paced = UploadPipeline { inter_item_delay: Duration::from_millis(40), ..pipeline(1) };

	let start = Instant::now();
	let outcome = paced
		.run(
			candidates(&files, &[("a.jpg", b"a"), ("b.jpg", b"b"), ("c.jpg", b"c")]),
			&DeviceIdentity::new("dev"),
			&transfer,
			|_: &Fingerprint| Ok(()),
			&NoStatus,
			&CancellationToken::new(),
		)
		.await;

	assert_eq!(outcome.succeeded, 3);
	// Two gaps between three uploads
	assert!(start.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn test_status_events_describe_the_run() {
	let files = TempDir::new().unwrap();
	let transfer = Always::new(TransferOutcome::recoverable("timeout"));
	let events = Mutex::new(Vec::new());

	pipeline(2)
		.run(
			candidates(&files, &[("a.jpg", b"a")]),
			&DeviceIdentity::new("dev"),
			&transfer,
			|_: &Fingerprint| Ok(()),
			&|e: &StatusEvent| events.lock().unwrap().push(e.clone()),
			&CancellationToken::new(),
		)
		.await;

	let events = events.into_inner().unwrap();
	assert!(matches!(events[0], StatusEvent::Uploading { attempt: 1, max_attempts: 2, .. }));
	assert!(matches!(events[1], StatusEvent::Retrying { attempt: 1, .. }));
	assert!(matches!(events[2], StatusEvent::Uploading { attempt: 2, .. }));
	assert!(matches!(events[3], StatusEvent::Failed { kind: FailureKind::RetriesExhausted, .. }));
	match events.last() {
		Some(StatusEvent::Finished(outcome)) => assert_eq!(outcome.failed_exhausted, 1),
		other => panic!("expected summary, got {:?}", other),
	}
}

// vim: ts=4
