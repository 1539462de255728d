//! Scanner behaviour against a real directory tree

use autobackup::scanner::{
	scan, sha256_bytes, weak_fingerprint, ExtensionFilter, PatternMatcher, Scanner, WalkOptions,
};
use autobackup::store::StateStore;
use autobackup::types::{CategoryToggles, Fingerprint};
use filetime::FileTime;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn tree() -> TempDir {
	let tmp = TempDir::new().unwrap();
	fs::create_dir_all(tmp.path().join("DCIM/Camera")).unwrap();
	fs::create_dir_all(tmp.path().join("Documents")).unwrap();
	fs::write(tmp.path().join("DCIM/Camera/IMG_0001.JPG"), b"first photo").unwrap();
	fs::write(tmp.path().join("DCIM/Camera/IMG_0002.jpg"), b"second photo").unwrap();
	fs::write(tmp.path().join("Documents/report.pdf"), b"%PDF-1.4").unwrap();
	fs::write(tmp.path().join("Documents/draft.tmp"), b"scratch").unwrap();
	tmp
}

fn paths(dirs: &[PathBuf], extensions: &[&str]) -> Vec<PathBuf> {
	scan(dirs, extensions.iter().copied(), |_| false).into_iter().map(|c| c.path).collect()
}

#[test]
fn test_scan_twice_yields_same_list() {
	let tmp = tree();
	let dirs = vec![tmp.path().to_path_buf()];

	let first = paths(&dirs, &["jpg", "pdf"]);
	let second = paths(&dirs, &["jpg", "pdf"]);
	assert_eq!(first.len(), 3);
	assert_eq!(first, second);
}

#[test]
fn test_extension_match_is_case_insensitive() {
	let tmp = tree();
	let found = paths(&[tmp.path().to_path_buf()], &[".JPG"]);
	assert_eq!(found.len(), 2);
}

#[test]
fn test_photo_and_tmp_scenario_with_store() {
	let tmp = TempDir::new().unwrap();
	let photos = tmp.path().join("photos");
	fs::create_dir_all(&photos).unwrap();
	fs::write(photos.join("photo.jpg"), b"jpeg payload").unwrap();
	fs::write(photos.join("note.tmp"), b"not backed up").unwrap();
	let store = StateStore::open_in(&tmp.path().join("state")).unwrap();
	let dirs = vec![photos.clone()];

	let found = scan(&dirs, ["jpg"], |f| store.contains_fingerprint(f).unwrap());
	assert_eq!(found.len(), 1);
	assert_eq!(found[0].path, photos.join("photo.jpg"));

	// Confirmed upload
	store.add_fingerprint(&found[0].fingerprint).unwrap();
	let photo = Fingerprint::strong(sha256_bytes(b"jpeg payload"));
	assert!(store.contains_fingerprint(&photo).unwrap());

	let again = scan(&dirs, ["jpg"], |f| store.contains_fingerprint(f).unwrap());
	assert!(again.is_empty());
}

#[test]
fn test_changed_content_is_rediscovered() {
	let tmp = TempDir::new().unwrap();
	let path = tmp.path().join("a.png");
	fs::write(&path, b"v1").unwrap();
	let dirs = vec![tmp.path().to_path_buf()];

	let first = scan(&dirs, ["png"], |_| false);
	let committed = first[0].fingerprint.clone();

	fs::write(&path, b"v2").unwrap();
	let second = scan(&dirs, ["png"], |f| *f == committed);
	assert_eq!(second.len(), 1);
	assert_ne!(second[0].fingerprint, committed);
}

#[test]
fn test_disabled_category_is_not_scanned() {
	let tmp = tree();
	let toggles = CategoryToggles { images: false, ..CategoryToggles::default() };
	let scanner = Scanner::new(
		vec![tmp.path().to_path_buf()],
		WalkOptions::default(),
		PatternMatcher::default(),
	);

	let report = scanner.scan(&ExtensionFilter::from_categories(&toggles), |_| false);
	let names: Vec<String> = report.candidates.iter().map(|c| c.name()).collect();
	assert_eq!(names, vec!["report.pdf"]);
}

#[test]
fn test_exclusion_pattern_relative_to_root() {
	let tmp = tree();
	let matcher = PatternMatcher::new(&["DCIM/**".to_string()]).unwrap();
	let scanner = Scanner::new(vec![tmp.path().to_path_buf()], WalkOptions::default(), matcher);

	let report = scanner.scan(&ExtensionFilter::new(["jpg", "pdf"]), |_| false);
	assert_eq!(report.candidates.len(), 1);
	assert_eq!(report.candidates[0].name(), "report.pdf");
}

#[test]
fn test_weak_fingerprint_uses_pinned_mtime() {
	let tmp = TempDir::new().unwrap();
	let path = tmp.path().join("clip.mp4");
	fs::write(&path, vec![1u8; 10]).unwrap();
	filetime::set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 250_000_000)).unwrap();

	let meta = fs::metadata(&path).unwrap();
	let fp = weak_fingerprint(&path, meta.len(), meta.modified().unwrap());
	assert_eq!(fp.as_str(), "clip.mp4_10_1700000000250");
	assert!(fp.is_weak());
}

// vim: ts=4
