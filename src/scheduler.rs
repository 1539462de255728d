//! Cycle scheduler
//!
//! Owns the `Idle -> Triggered -> Running -> Idle` state machine. Immediate
//! and periodic invocations share [`Scheduler::trigger`]; a trigger that
//! arrives while a cycle is active is coalesced and has no effect. At most one
//! periodic trigger is registered at any time.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::TriggerConfig;
use crate::environment::{Environment, NetworkKind, SystemEnvironment};
use crate::error::BackupError;
use crate::logging::*;
use crate::pipeline::{PipelineOutcome, UploadPipeline};
use crate::scanner::{ExtensionFilter, ScanStats, Scanner};
use crate::status::{NoStatus, StatusEvent, StatusReporter};
use crate::store::StoreHandle;
use crate::transfer::Transfer;
use crate::types::Settings;
use crate::utils::now_millis;
use crate::validation::MIN_SCAN_INTERVAL_MS;

const IDLE: u8 = 0;
const TRIGGERED: u8 = 1;
const RUNNING: u8 = 2;

/// Shortest accepted period for the periodic trigger
pub const MIN_PERIOD: Duration = Duration::from_millis(MIN_SCAN_INTERVAL_MS as u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
	Idle,
	/// Accepted a trigger, evaluating the settings gate
	Triggered,
	/// Scanning and uploading
	Running,
}

impl SchedulerState {
	fn from_u8(value: u8) -> Self {
		match value {
			TRIGGERED => SchedulerState::Triggered,
			RUNNING => SchedulerState::Running,
			_ => SchedulerState::Idle,
		}
	}
}

impl fmt::Display for SchedulerState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SchedulerState::Idle => write!(f, "idle"),
			SchedulerState::Triggered => write!(f, "triggered"),
			SchedulerState::Running => write!(f, "running"),
		}
	}
}

/// Why a trigger did not lead to a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	AutoBackupDisabled,
	/// `wifi_only` is set and the current network is something else
	WifiRequired,
	NoNetwork,
	BatteryLow,
	ShuttingDown,
}

impl fmt::Display for SkipReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SkipReason::AutoBackupDisabled => write!(f, "automatic backup is disabled"),
			SkipReason::WifiRequired => write!(f, "waiting for Wi-Fi"),
			SkipReason::NoNetwork => write!(f, "no network connection"),
			SkipReason::BatteryLow => write!(f, "battery low"),
			SkipReason::ShuttingDown => write!(f, "shutting down"),
		}
	}
}

/// Result of a cycle that was allowed to start
#[derive(Debug, Clone)]
pub enum CycleReport {
	/// The settings gate stopped the cycle before any scan I/O
	Skipped(SkipReason),
	Completed { scan: ScanStats, outcome: PipelineOutcome },
}

#[derive(Debug, Clone)]
pub enum TriggerResult {
	/// Another cycle was active; this trigger was dropped
	Coalesced,
	Finished(CycleReport),
}

/// Outcome of [`Scheduler::register_periodic`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
	Created,
	/// An identical trigger was already registered; nothing changed
	AlreadyActive,
	/// The previous trigger had a different period and was cancelled
	Replaced,
}

/// Settings gate evaluated on entry to a cycle
pub fn gate(settings: &Settings, network: impl FnOnce() -> NetworkKind) -> Option<SkipReason> {
	if !settings.auto_backup_enabled {
		return Some(SkipReason::AutoBackupDisabled);
	}
	if settings.wifi_only && !network().is_wifi() {
		return Some(SkipReason::WifiRequired);
	}
	None
}

struct Periodic {
	interval: Duration,
	token: CancellationToken,
	handle: JoinHandle<()>,
}

/// Resets the scheduler to `Idle` when a cycle ends, however it ends
struct StateGuard<'a> {
	scheduler: &'a Scheduler,
}

impl Drop for StateGuard<'_> {
	fn drop(&mut self) {
		self.scheduler.set_state(IDLE);
	}
}

pub struct Scheduler {
	store: StoreHandle,
	scanner: Scanner,
	pipeline: UploadPipeline,
	transfer: Arc<dyn Transfer>,
	environment: Arc<dyn Environment>,
	reporter: Arc<dyn StatusReporter>,
	trigger_config: TriggerConfig,
	state: AtomicU8,
	state_tx: watch::Sender<SchedulerState>,
	/// Cancels the current cycle; replaced at the start of every cycle
	cycle_token: Mutex<CancellationToken>,
	shutdown: CancellationToken,
	periodic: Mutex<Option<Periodic>>,
}

impl Scheduler {
	pub fn new(
		store: impl Into<StoreHandle>,
		scanner: Scanner,
		pipeline: UploadPipeline,
		transfer: Arc<dyn Transfer>,
	) -> Self {
		let (state_tx, _) = watch::channel(SchedulerState::Idle);
		let shutdown = CancellationToken::new();
		Scheduler {
			store: store.into(),
			scanner,
			pipeline,
			transfer,
			environment: Arc::new(SystemEnvironment::new(None)),
			reporter: Arc::new(NoStatus),
			trigger_config: TriggerConfig::default(),
			state: AtomicU8::new(IDLE),
			state_tx,
			cycle_token: Mutex::new(shutdown.child_token()),
			shutdown,
			periodic: Mutex::new(None),
		}
	}

	pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
		self.environment = environment;
		self
	}

	pub fn with_reporter(mut self, reporter: Arc<dyn StatusReporter>) -> Self {
		self.reporter = reporter;
		self
	}

	pub fn with_trigger_config(mut self, config: TriggerConfig) -> Self {
		self.trigger_config = config;
		self
	}

	pub fn store(&self) -> &StoreHandle {
		&self.store
	}

	pub fn state(&self) -> SchedulerState {
		SchedulerState::from_u8(self.state.load(Ordering::Acquire))
	}

	/// Watch state transitions without blocking on the cycle
	pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
		self.state_tx.subscribe()
	}

	fn set_state(&self, value: u8) {
		self.state.store(value, Ordering::Release);
		self.state_tx.send_replace(SchedulerState::from_u8(value));
	}

	/// Run one cycle now, unless one is already active
	///
	/// Errors are cycle-level failures (state store trouble); the scheduler
	/// itself stays usable and returns to `Idle`.
	pub async fn trigger(&self) -> Result<TriggerResult, BackupError> {
		let claimed =
			self.state.compare_exchange(IDLE, TRIGGERED, Ordering::AcqRel, Ordering::Acquire);
		if claimed.is_err() {
			debug!("Cycle already active, trigger coalesced");
			return Ok(TriggerResult::Coalesced);
		}
		let _guard = StateGuard { scheduler: self };
		// From here on stop() cancels this cycle, gate included
		let cancel = self.new_cycle_token();
		self.state_tx.send_replace(SchedulerState::Triggered);

		match self.run_cycle(&cancel).await {
			Ok(report) => Ok(TriggerResult::Finished(report)),
			Err(e) => {
				error!("Backup cycle failed: {}", e);
				self.reporter.on_event(&StatusEvent::CycleFailed { message: e.to_string() });
				Err(e)
			}
		}
	}

	async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, BackupError> {
		if self.shutdown.is_cancelled() {
			return Ok(self.skip(SkipReason::ShuttingDown));
		}

		let store = self.store.acquire().await?;
		let settings = store.settings()?;
		if let Some(reason) = gate(&settings, || self.environment.network()) {
			return Ok(self.skip(reason));
		}

		self.set_state(RUNNING);
		self.reporter.on_event(&StatusEvent::CycleStarted);

		let identity = store.identity()?;
		let uploaded = store.fingerprints()?;
		let filter = ExtensionFilter::from_categories(&settings.categories);
		let scanner = self.scanner.clone();
		let scan = tokio::task::spawn_blocking(move || {
			scanner.scan(&filter, |fingerprint| uploaded.contains(fingerprint))
		})
		.await?;

		if let Err(e) = store.record_scan(now_millis()) {
			warn!("Could not record scan time: {}", e);
		}
		info!("Scan found {} new file(s)", scan.candidates.len());
		self.reporter.on_event(&StatusEvent::ScanFinished { candidates: scan.candidates.len() });

		let outcome = self
			.pipeline
			.run(
				scan.candidates,
				&identity,
				self.transfer.as_ref(),
				|fingerprint| store.add_fingerprint(fingerprint).map(|_| ()),
				self.reporter.as_ref(),
				cancel,
			)
			.await;
		info!("{}", outcome);

		Ok(CycleReport::Completed { scan: scan.stats, outcome })
	}

	fn skip(&self, reason: SkipReason) -> CycleReport {
		info!("Backup cycle skipped: {}", reason);
		self.reporter.on_event(&StatusEvent::CycleSkipped { reason });
		CycleReport::Skipped(reason)
	}

	fn new_cycle_token(&self) -> CancellationToken {
		let token = self.shutdown.child_token();
		if let Ok(mut slot) = self.cycle_token.lock() {
			*slot = token.clone();
		}
		token
	}

	/// Ask the running cycle to stop at the next file boundary
	pub fn stop(&self) {
		if let Ok(slot) = self.cycle_token.lock() {
			slot.cancel();
		}
	}

	/// Constraint check of the periodic trigger layer
	pub fn trigger_constraints(&self) -> Option<SkipReason> {
		if self.trigger_config.require_network && !self.environment.network().is_connected() {
			return Some(SkipReason::NoNetwork);
		}
		if self.trigger_config.require_battery_not_low && self.environment.power().is_low() {
			return Some(SkipReason::BatteryLow);
		}
		None
	}

	async fn fire_periodic(&self) {
		if let Some(reason) = self.trigger_constraints() {
			self.skip(reason);
			return;
		}
		match self.trigger().await {
			Ok(TriggerResult::Coalesced) => debug!("Periodic trigger coalesced"),
			Ok(TriggerResult::Finished(_)) => {}
			// Already logged; the next tick tries again
			Err(_) => {}
		}
	}

	/// Register the periodic trigger
	///
	/// Re-registering the same period is a no-op. A different period replaces
	/// the current trigger, so there is never more than one. Periods below
	/// [`MIN_PERIOD`] are raised to it.
	pub fn register_periodic(self: &Arc<Self>, interval: Duration) -> Registration {
		let interval = interval.max(MIN_PERIOD);
		let mut slot = match self.periodic.lock() {
			Ok(s) => s,
			Err(poisoned) => poisoned.into_inner(),
		};

		let replaced = match slot.take() {
			Some(current) if current.interval == interval && !current.handle.is_finished() => {
				*slot = Some(current);
				return Registration::AlreadyActive;
			}
			Some(current) => {
				current.token.cancel();
				true
			}
			None => false,
		};

		let token = self.shutdown.child_token();
		let handle = tokio::spawn(periodic_loop(Arc::downgrade(self), interval, token.clone()));
		*slot = Some(Periodic { interval, token, handle });
		info!("Periodic backup every {:?}", interval);

		if replaced {
			Registration::Replaced
		} else {
			Registration::Created
		}
	}

	/// Period of the registered trigger, if any
	pub fn periodic_interval(&self) -> Option<Duration> {
		let slot = self.periodic.lock().ok()?;
		slot.as_ref().filter(|p| !p.handle.is_finished()).map(|p| p.interval)
	}

	/// Cancel the periodic trigger and any running cycle, then wait for the trigger task
	pub async fn shutdown(&self) {
		self.shutdown.cancel();
		let periodic = match self.periodic.lock() {
			Ok(mut s) => s.take(),
			Err(poisoned) => poisoned.into_inner().take(),
		};
		if let Some(periodic) = periodic {
			if let Err(e) = periodic.handle.await {
				debug!("Periodic trigger task ended abnormally: {}", e);
			}
		}
	}
}

async fn periodic_loop(scheduler: Weak<Scheduler>, interval: Duration, token: CancellationToken) {
	let mut ticker = tokio::time::interval(interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			_ = token.cancelled() => break,
			_ = ticker.tick() => {}
		}
		let Some(scheduler) = scheduler.upgrade() else {
			break;
		};
		scheduler.fire_periodic().await;
	}
	debug!("Periodic trigger stopped");
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_gate_disabled_wins_and_skips_network_probe() {
		let settings =
			Settings { auto_backup_enabled: false, wifi_only: true, ..Settings::default() };
		let reason = gate(&settings, || panic!("network must not be probed"));
		assert_eq!(reason, Some(SkipReason::AutoBackupDisabled));
	}

	#[test]
	fn test_gate_wifi_only() {
		let settings = Settings { wifi_only: true, ..Settings::default() };
		assert_eq!(gate(&settings, || NetworkKind::Cellular), Some(SkipReason::WifiRequired));
		assert_eq!(gate(&settings, || NetworkKind::Ethernet), Some(SkipReason::WifiRequired));
		assert_eq!(gate(&settings, || NetworkKind::Wifi), None);
	}

	#[test]
	fn test_gate_passes_by_default() {
		assert_eq!(gate(&Settings::default(), || NetworkKind::Offline), None);
	}

	#[test]
	fn test_state_from_u8() {
		assert_eq!(SchedulerState::from_u8(IDLE), SchedulerState::Idle);
		assert_eq!(SchedulerState::from_u8(TRIGGERED), SchedulerState::Triggered);
		assert_eq!(SchedulerState::from_u8(RUNNING), SchedulerState::Running);
	}
}

// vim: ts=4
