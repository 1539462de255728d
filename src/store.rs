//! Persistent state store
//!
//! Holds the device identity, the set of uploaded-content fingerprints and the
//! user settings in a single redb database. Every mutation is its own write
//! transaction and is committed durably before the call returns. redb admits
//! one write transaction at a time, which makes read-modify-write sequences
//! such as identity creation linearizable; readers see the last committed
//! snapshot and never wait on a writer.

use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::logging::*;
use crate::types::{DeviceIdentity, Fingerprint, Settings};
use crate::utils::now_millis;
use crate::validation::{Validator, MIN_SCAN_INTERVAL_MS};

/// Database file name inside the state directory
pub const STATE_DB_NAME: &str = "state.redb";

/// Table definition for singleton values
/// Key: value name (device_id, last_scan_ms)
/// Value: string value
const META_TABLE: TableDefinition<&str, &str> = TableDefinition::new("meta");

/// Table definition for uploaded fingerprints
/// Key: fingerprint string
/// Value: commit time in epoch milliseconds
const FINGERPRINTS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("fingerprints");

/// Table definition for user settings (flat key/value)
const SETTINGS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Default wait for a database held by another process
pub const STORE_WAIT: Duration = Duration::from_secs(30);

const BUSY_RETRY_INITIAL: Duration = Duration::from_millis(50);
const BUSY_RETRY_MAX: Duration = Duration::from_secs(2);

const META_DEVICE_ID: &str = "device_id";
const META_LAST_SCAN: &str = "last_scan_ms";

/// Snapshot of the uploaded fingerprint set
#[derive(Debug, Clone, Default)]
pub struct FingerprintSet {
	values: HashSet<String>,
}

impl FingerprintSet {
	pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
		self.values.contains(fingerprint.as_str())
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

/// Generate a fresh device identity: `{hostname}_{epoch_ms}`, or a random UUID
fn generate_identity() -> DeviceIdentity {
	let host = sysinfo::System::host_name()
		.map(|h| h.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect::<String>())
		.filter(|h| !h.is_empty());

	match host {
		Some(host) => DeviceIdentity::new(format!("{}_{}", host, now_millis())),
		None => DeviceIdentity::new(uuid::Uuid::new_v4().to_string()),
	}
}

/// State store backed by a redb database
pub struct StateStore {
	db: redb::Database,
	path: PathBuf,
}

impl StateStore {
	/// Open or create the state database at `db_path`
	pub fn open(db_path: &Path) -> Result<Self, StoreError> {
		if let Some(parent) = db_path.parent() {
			if !parent.as_os_str().is_empty() && !parent.exists() {
				std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
					path: db_path.to_path_buf(),
					source: redb::DatabaseError::Storage(redb::StorageError::Io(e)),
				})?;
			}
		}

		let db = redb::Database::create(db_path).map_err(|e| match e {
			redb::DatabaseError::DatabaseAlreadyOpen => {
				StoreError::Busy { path: db_path.to_path_buf() }
			}
			e => StoreError::Open { path: db_path.to_path_buf(), source: e },
		})?;
		// Ensure all tables exist so read transactions can open them
		{
			let write_txn = db.begin_write()?;
			let _ = write_txn.open_table(META_TABLE)?;
			let _ = write_txn.open_table(FINGERPRINTS_TABLE)?;
			let _ = write_txn.open_table(SETTINGS_TABLE)?;
			write_txn.commit()?;
		}
		debug!("Opened state store at {}", db_path.display());
		Ok(StateStore { db, path: db_path.to_path_buf() })
	}

	/// Open the store inside a state directory
	pub fn open_in(state_dir: &Path) -> Result<Self, StoreError> {
		Self::open(&state_dir.join(STATE_DB_NAME))
	}

	/// Open the database, waiting up to `wait` while another holder has it open
	pub async fn open_waiting(db_path: &Path, wait: Duration) -> Result<Self, StoreError> {
		let deadline = tokio::time::Instant::now() + wait;
		let mut delay = BUSY_RETRY_INITIAL;
		loop {
			match Self::open(db_path) {
				Err(StoreError::Busy { .. }) if tokio::time::Instant::now() + delay <= deadline => {
					debug!("State database busy, retrying in {:?}", delay);
					tokio::time::sleep(delay).await;
					delay = (delay * 2).min(BUSY_RETRY_MAX);
				}
				result => return result,
			}
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Device identity, created and persisted on first call
	pub fn identity(&self) -> Result<DeviceIdentity, StoreError> {
		{
			let read_txn = self.db.begin_read()?;
			let table = read_txn.open_table(META_TABLE)?;
			if let Some(entry) = table.get(META_DEVICE_ID)? {
				return Ok(DeviceIdentity::new(entry.value()));
			}
		}

		// Re-check under the write transaction: another caller may have won
		let write_txn = self.db.begin_write()?;
		let identity = {
			let mut table = write_txn.open_table(META_TABLE)?;
			let existing = table.get(META_DEVICE_ID)?.map(|e| e.value().to_string());
			match existing {
				Some(id) => DeviceIdentity::new(id),
				None => {
					let identity = generate_identity();
					table.insert(META_DEVICE_ID, identity.as_str())?;
					info!("Generated device identity {}", identity);
					identity
				}
			}
		};
		write_txn.commit()?;
		Ok(identity)
	}

	pub fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(FINGERPRINTS_TABLE)?;
		Ok(table.get(fingerprint.as_str())?.is_some())
	}

	/// Record a confirmed upload
	///
	/// Idempotent: returns `false` and leaves the stored entry untouched when
	/// the fingerprint is already present.
	pub fn add_fingerprint(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
		let write_txn = self.db.begin_write()?;
		let inserted = {
			let mut table = write_txn.open_table(FINGERPRINTS_TABLE)?;
			if table.get(fingerprint.as_str())?.is_some() {
				false
			} else {
				table.insert(fingerprint.as_str(), now_millis())?;
				true
			}
		};
		write_txn.commit()?;
		Ok(inserted)
	}

	/// Forget every uploaded fingerprint ("re-upload everything")
	///
	/// Returns the number of fingerprints removed.
	pub fn clear_fingerprints(&self) -> Result<u64, StoreError> {
		let write_txn = self.db.begin_write()?;
		let removed = {
			let table = write_txn.open_table(FINGERPRINTS_TABLE)?;
			table.len()?
		};
		write_txn.delete_table(FINGERPRINTS_TABLE)?;
		let _ = write_txn.open_table(FINGERPRINTS_TABLE)?;
		write_txn.commit()?;
		info!("Cleared {} uploaded fingerprints", removed);
		Ok(removed)
	}

	pub fn fingerprint_count(&self) -> Result<u64, StoreError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(FINGERPRINTS_TABLE)?;
		Ok(table.len()?)
	}

	/// Consistent snapshot of the uploaded set
	pub fn fingerprints(&self) -> Result<FingerprintSet, StoreError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(FINGERPRINTS_TABLE)?;
		let mut values = HashSet::new();
		for item in table.iter()? {
			let (key, _) = item?;
			values.insert(key.value().to_string());
		}
		Ok(FingerprintSet { values })
	}

	pub fn settings(&self) -> Result<Settings, StoreError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(SETTINGS_TABLE)?;
		let mut entries = Vec::new();
		for item in table.iter()? {
			let (key, value) = item?;
			entries.push((key.value().to_string(), value.value().to_string()));
		}
		let mut settings =
			Settings::from_entries(entries).map_err(|message| StoreError::Corrupted { message })?;
		if let Err(e) = settings.validate() {
			warn!("Stored settings invalid ({}), using the minimum scan interval", e);
			settings.scan_interval_ms = MIN_SCAN_INTERVAL_MS;
		}
		Ok(settings)
	}

	/// Replace all settings atomically; invalid settings are rejected
	pub fn set_settings(&self, settings: &Settings) -> Result<(), StoreError> {
		settings.validate().map_err(|reason| StoreError::Rejected { reason })?;

		let write_txn = self.db.begin_write()?;
		{
			let mut table = write_txn.open_table(SETTINGS_TABLE)?;
			for (key, value) in settings.to_entries() {
				table.insert(key.as_str(), value.as_str())?;
			}
		}
		write_txn.commit()?;
		debug!("Settings updated: {:?}", settings);
		Ok(())
	}

	/// Completion time of the last scan, in epoch milliseconds
	pub fn last_scan(&self) -> Result<Option<u64>, StoreError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(META_TABLE)?;
		match table.get(META_LAST_SCAN)? {
			Some(entry) => entry.value().parse().map(Some).map_err(|_| StoreError::Corrupted {
				message: format!("invalid {}: {}", META_LAST_SCAN, entry.value()),
			}),
			None => Ok(None),
		}
	}

	pub fn record_scan(&self, at_millis: u64) -> Result<(), StoreError> {
		let write_txn = self.db.begin_write()?;
		{
			let mut table = write_txn.open_table(META_TABLE)?;
			table.insert(META_LAST_SCAN, at_millis.to_string().as_str())?;
		}
		write_txn.commit()?;
		Ok(())
	}
}

/// Access to the state store for long-lived owners
///
/// `Shared` keeps one store open. `OnDemand` opens the database on every
/// [`StoreHandle::acquire`] and closes it when the last returned reference is
/// dropped, so other processes can open it between uses.
#[derive(Clone)]
pub enum StoreHandle {
	Shared(Arc<StateStore>),
	OnDemand { path: PathBuf, wait: Duration },
}

impl StoreHandle {
	pub fn on_demand(state_dir: &Path, wait: Duration) -> Self {
		StoreHandle::OnDemand { path: state_dir.join(STATE_DB_NAME), wait }
	}

	pub async fn acquire(&self) -> Result<Arc<StateStore>, StoreError> {
		match self {
			StoreHandle::Shared(store) => Ok(Arc::clone(store)),
			StoreHandle::OnDemand { path, wait } => {
				Ok(Arc::new(StateStore::open_waiting(path, *wait).await?))
			}
		}
	}
}

impl From<Arc<StateStore>> for StoreHandle {
	fn from(store: Arc<StateStore>) -> Self {
		StoreHandle::Shared(store)
	}
}


// vim: ts=4
