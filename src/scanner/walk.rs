//! Lazy recursive directory walk
//!
//! Yields regular files one at a time, depth first, with the entries of each
//! directory visited in file-name order. Directory identities are remembered
//! for the lifetime of the walker, so symlink loops and overlapping roots are
//! entered only once.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::exclude::PatternMatcher;
use crate::logging::*;

/// A regular file produced by the walk
#[derive(Debug)]
pub struct WalkEntry {
	pub path: PathBuf,
	pub metadata: fs::Metadata,
}

/// Walk behaviour knobs
#[derive(Debug, Clone)]
pub struct WalkOptions {
	/// Descend into symlinked directories and report symlinked files
	pub follow_symlinks: bool,

	/// Maximum directory depth below a root (root itself is depth 0)
	pub max_depth: usize,
}

impl Default for WalkOptions {
	fn default() -> Self {
		WalkOptions { follow_symlinks: false, max_depth: 64 }
	}
}

#[cfg(unix)]
type DirKey = (u64, u64);
#[cfg(not(unix))]
type DirKey = PathBuf;

#[cfg(unix)]
fn dir_key(_path: &Path, meta: &fs::Metadata) -> Option<DirKey> {
	use std::os::unix::fs::MetadataExt;
	Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn dir_key(path: &Path, _meta: &fs::Metadata) -> Option<DirKey> {
	fs::canonicalize(path).ok()
}

struct Frame {
	root: usize,
	depth: usize,
	entries: std::vec::IntoIter<PathBuf>,
}

/// Iterator over the regular files below a list of roots
pub struct DirWalker {
	roots: Vec<PathBuf>,
	next_root: usize,
	stack: Vec<Frame>,
	visited: HashSet<DirKey>,
	options: WalkOptions,
	exclude: PatternMatcher,
}

impl DirWalker {
	pub fn new(roots: Vec<PathBuf>, options: WalkOptions, exclude: PatternMatcher) -> Self {
		DirWalker {
			roots,
			next_root: 0,
			stack: Vec::new(),
			visited: HashSet::new(),
			options,
			exclude,
		}
	}

	/// Read a directory listing sorted by file name; unreadable directories are skipped
	fn list_dir(dir: &Path) -> Option<Vec<PathBuf>> {
		let entries = match fs::read_dir(dir) {
			Ok(e) => e,
			Err(e) => {
				warn!("Cannot read directory {}: {}", dir.display(), e);
				return None;
			}
		};

		let mut paths: Vec<PathBuf> = Vec::new();
		for entry_result in entries {
			match entry_result {
				Ok(entry) => paths.push(entry.path()),
				Err(e) => debug!("Error reading entry in {}: {}", dir.display(), e),
			}
		}
		paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
		Some(paths)
	}

	/// Push a directory frame unless it was already visited
	fn enter(&mut self, root: usize, depth: usize, dir: &Path, meta: &fs::Metadata) {
		if let Some(key) = dir_key(dir, meta) {
			if !self.visited.insert(key) {
				debug!("Skipping already visited directory {}", dir.display());
				return;
			}
		}
		if let Some(entries) = Self::list_dir(dir) {
			self.stack.push(Frame { root, depth, entries: entries.into_iter() });
		}
	}

	fn start_next_root(&mut self) -> bool {
		while self.next_root < self.roots.len() {
			let index = self.next_root;
			self.next_root += 1;
			let root = self.roots[index].clone();

			match fs::metadata(&root) {
				Ok(meta) if meta.is_dir() => {
					self.enter(index, 0, &root, &meta);
					return true;
				}
				Ok(_) => debug!("Monitored path {} is not a directory", root.display()),
				Err(e) => debug!("Monitored directory {} unavailable: {}", root.display(), e),
			}
		}
		false
	}

	fn is_excluded(&self, root: usize, path: &Path) -> bool {
		match path.strip_prefix(&self.roots[root]) {
			Ok(rel) => self.exclude.is_excluded(rel),
			Err(_) => false,
		}
	}
}

impl Iterator for DirWalker {
	type Item = WalkEntry;

	fn next(&mut self) -> Option<WalkEntry> {
		loop {
			if self.stack.is_empty() {
				if self.start_next_root() {
					continue;
				}
				return None;
			}
			let frame = self.stack.last_mut()?;

			let (root, depth) = (frame.root, frame.depth);
			let Some(path) = frame.entries.next() else {
				self.stack.pop();
				continue;
			};

			if self.is_excluded(root, &path) {
				debug!("Excluded by pattern: {}", path.display());
				continue;
			}

			let link_meta = match fs::symlink_metadata(&path) {
				Ok(m) => m,
				Err(e) => {
					debug!("Cannot access {}: {}", path.display(), e);
					continue;
				}
			};

			let meta = if link_meta.file_type().is_symlink() {
				if !self.options.follow_symlinks {
					continue;
				}
				match fs::metadata(&path) {
					Ok(m) => m,
					Err(e) => {
						debug!("Dangling symlink {}: {}", path.display(), e);
						continue;
					}
				}
			} else {
				link_meta
			};

			if meta.is_dir() {
				if depth + 1 > self.options.max_depth {
					warn!("Maximum depth reached, not descending into {}", path.display());
					continue;
				}
				self.enter(root, depth + 1, &path, &meta);
			} else if meta.is_file() {
				return Some(WalkEntry { path, metadata: meta });
			}
		}
	}
}


// vim: ts=4
