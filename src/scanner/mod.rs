//! Content scanner
//!
//! Walks the monitored directories, keeps files whose extension is on the
//! allow-list, fingerprints them and yields those whose fingerprint is not in
//! the uploaded set. Fingerprinting only happens after the extension check.
//! The scanner lists directories and reads files; it never writes anything.

mod categories;
mod exclude;
mod fingerprint;
mod walk;

pub use categories::{extension_of, ExtensionFilter, FileCategory};
pub use exclude::{PatternError, PatternMatcher};
pub use fingerprint::{fingerprint_file, sha256_bytes, sha256_file, weak_fingerprint};
pub use walk::{DirWalker, WalkEntry, WalkOptions};

use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use crate::config::Config;
use crate::logging::*;
use crate::types::{CandidateFile, Fingerprint};

/// Counters collected while a scan runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
	/// Regular files produced by the walk
	pub files_seen: usize,
	/// Files dropped by the extension filter (never fingerprinted)
	pub filtered_out: usize,
	/// Files whose fingerprint is already uploaded
	pub already_uploaded: usize,
	/// Fingerprints that fell back to name/size/mtime
	pub weak_fingerprints: usize,
	/// Candidates yielded
	pub candidates: usize,
}

/// Result of a complete scan
#[derive(Debug, Clone)]
pub struct ScanReport {
	pub candidates: Vec<CandidateFile>,
	pub stats: ScanStats,
}

/// Scanner over a fixed set of monitored directories
#[derive(Debug, Clone)]
pub struct Scanner {
	dirs: Vec<PathBuf>,
	options: WalkOptions,
	exclude: PatternMatcher,
}

impl Scanner {
	pub fn new(dirs: Vec<PathBuf>, options: WalkOptions, exclude: PatternMatcher) -> Self {
		Scanner { dirs, options, exclude }
	}

	/// Build a scanner from the agent configuration
	pub fn from_config(config: &Config) -> Result<Self, PatternError> {
		let exclude = PatternMatcher::new(&config.exclude_patterns)?;
		let options =
			WalkOptions { follow_symlinks: config.follow_symlinks, max_depth: config.max_depth };
		Ok(Scanner::new(config.monitored_dirs.clone(), options, exclude))
	}

	pub fn dirs(&self) -> &[PathBuf] {
		&self.dirs
	}

	/// Lazily produce candidates one at a time
	///
	/// The sequence is finite and not restartable; scanning again means
	/// calling this again.
	pub fn candidates<F>(&self, filter: &ExtensionFilter, is_uploaded: F) -> Candidates<F>
	where
		F: Fn(&Fingerprint) -> bool,
	{
		Candidates {
			walker: DirWalker::new(self.dirs.clone(), self.options.clone(), self.exclude.clone()),
			filter: filter.clone(),
			is_uploaded,
			stats: ScanStats::default(),
		}
	}

	/// Run a full scan and collect candidates in traversal order
	pub fn scan<F>(&self, filter: &ExtensionFilter, is_uploaded: F) -> ScanReport
	where
		F: Fn(&Fingerprint) -> bool,
	{
		let mut iter = self.candidates(filter, is_uploaded);
		let candidates: Vec<CandidateFile> = iter.by_ref().collect();
		let stats = iter.stats().clone();
		debug!(
			"Scan finished: {} seen, {} filtered, {} already uploaded, {} candidates",
			stats.files_seen, stats.filtered_out, stats.already_uploaded, stats.candidates
		);
		ScanReport { candidates, stats }
	}
}

/// Lazy candidate sequence returned by [`Scanner::candidates`]
pub struct Candidates<F> {
	walker: DirWalker,
	filter: ExtensionFilter,
	is_uploaded: F,
	stats: ScanStats,
}

impl<F> Candidates<F> {
	pub fn stats(&self) -> &ScanStats {
		&self.stats
	}
}

impl<F> Iterator for Candidates<F>
where
	F: Fn(&Fingerprint) -> bool,
{
	type Item = CandidateFile;

	fn next(&mut self) -> Option<CandidateFile> {
		for entry in self.walker.by_ref() {
			self.stats.files_seen += 1;

			if !self.filter.allows(&entry.path) {
				self.stats.filtered_out += 1;
				continue;
			}

			let fingerprint = fingerprint_file(&entry.path, &entry.metadata);
			if fingerprint.is_weak() {
				self.stats.weak_fingerprints += 1;
			}

			if (self.is_uploaded)(&fingerprint) {
				self.stats.already_uploaded += 1;
				continue;
			}

			debug!("New file found: {}", entry.path.display());
			self.stats.candidates += 1;
			let category = extension_of(&entry.path).and_then(|e| FileCategory::from_extension(&e));
			return Some(CandidateFile {
				size: entry.metadata.len(),
				modified: entry.metadata.modified().unwrap_or(UNIX_EPOCH),
				path: entry.path,
				fingerprint,
				category,
			});
		}
		None
	}
}

/// Scan `monitored_dirs` for files with an allowed extension not yet uploaded
///
/// Uses default walk options and the built-in exclusions only.
pub fn scan<I, S, F>(
	monitored_dirs: &[PathBuf],
	allowed_extensions: I,
	is_uploaded: F,
) -> Vec<CandidateFile>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
	F: Fn(&Fingerprint) -> bool,
{
	let scanner =
		Scanner::new(monitored_dirs.to_vec(), WalkOptions::default(), PatternMatcher::default());
	scanner.scan(&ExtensionFilter::new(allowed_extensions), is_uploaded).candidates
}


// vim: ts=4
