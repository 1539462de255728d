//! Content fingerprints
//!
//! The strong fingerprint is the hex SHA-256 of the whole file. When the
//! content cannot be read the fingerprint degrades to
//! `{name}_{size}_{mtime_ms}`. A weak fingerprint misses content changes that
//! keep size and mtime, and can collide between unrelated files with equal
//! name, size and mtime; both are accepted limitations.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::logging::*;
use crate::types::Fingerprint;
use crate::utils::epoch_millis;

/// Read buffer for hashing
const HASH_BUFFER_SIZE: usize = 65536;

/// Hex SHA-256 of a file's full content
pub fn sha256_file(path: &Path) -> io::Result<String> {
	let mut file = fs::File::open(path)?;
	let mut hasher = Sha256::new();
	let mut buf = vec![0u8; HASH_BUFFER_SIZE];
	loop {
		let n = file.read(&mut buf)?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}
	Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of an in-memory buffer
pub fn sha256_bytes(content: &[u8]) -> String {
	hex::encode(Sha256::digest(content))
}

/// Degraded fingerprint from name, size and modification time
pub fn weak_fingerprint(path: &Path, size: u64, modified: SystemTime) -> Fingerprint {
	let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
	Fingerprint::weak(format!("{}_{}_{}", name, size, epoch_millis(modified)))
}

/// Fingerprint a file, falling back to the weak form on read failure
pub fn fingerprint_file(path: &Path, metadata: &fs::Metadata) -> Fingerprint {
	match sha256_file(path) {
		Ok(hash) => Fingerprint::strong(hash),
		Err(e) => {
			let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
			warn!("Cannot read {} ({}), using weak fingerprint", path.display(), e);
			weak_fingerprint(path, metadata.len(), modified)
		}
	}
}


// vim: ts=4
