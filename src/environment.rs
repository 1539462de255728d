//! Network and power probes
//!
//! Consulted by the periodic trigger (connectivity, battery) and by the
//! scheduler's Wi-Fi gate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::logging::*;

/// Battery level below which a discharging battery counts as low
pub const LOW_BATTERY_PERCENT: u8 = 15;

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Kind of the active network connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
	Wifi,
	Ethernet,
	Cellular,
	Offline,
}

impl NetworkKind {
	pub fn is_connected(self) -> bool {
		self != NetworkKind::Offline
	}

	pub fn is_wifi(self) -> bool {
		self == NetworkKind::Wifi
	}
}

impl fmt::Display for NetworkKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			NetworkKind::Wifi => "Wi-Fi",
			NetworkKind::Ethernet => "Ethernet",
			NetworkKind::Cellular => "cellular",
			NetworkKind::Offline => "offline",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
	/// Mains power, or a battery that is charging or full
	External,
	Battery { low: bool },
	/// No power supply information available
	Unknown,
}

impl PowerState {
	pub fn is_low(self) -> bool {
		matches!(self, PowerState::Battery { low: true })
	}
}

impl fmt::Display for PowerState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PowerState::External => write!(f, "external power"),
			PowerState::Battery { low: true } => write!(f, "battery (low)"),
			PowerState::Battery { low: false } => write!(f, "battery"),
			PowerState::Unknown => write!(f, "unknown"),
		}
	}
}

/// Source of network and power state
pub trait Environment: Send + Sync {
	fn network(&self) -> NetworkKind;
	fn power(&self) -> PowerState;
}

/// Environment with externally controlled values
pub struct FixedEnvironment {
	state: RwLock<(NetworkKind, PowerState)>,
}

impl FixedEnvironment {
	pub fn new(network: NetworkKind, power: PowerState) -> Self {
		FixedEnvironment { state: RwLock::new((network, power)) }
	}

	pub fn set_network(&self, network: NetworkKind) {
		if let Ok(mut state) = self.state.write() {
			state.0 = network;
		}
	}

	pub fn set_power(&self, power: PowerState) {
		if let Ok(mut state) = self.state.write() {
			state.1 = power;
		}
	}
}

impl Default for FixedEnvironment {
	fn default() -> Self {
		FixedEnvironment::new(NetworkKind::Wifi, PowerState::External)
	}
}

impl Environment for FixedEnvironment {
	fn network(&self) -> NetworkKind {
		self.state.read().map(|s| s.0).unwrap_or(NetworkKind::Offline)
	}

	fn power(&self) -> PowerState {
		self.state.read().map(|s| s.1).unwrap_or(PowerState::Unknown)
	}
}

/// Classify an interface by its name
pub fn classify_interface(name: &str) -> Option<NetworkKind> {
	if name.starts_with("wl") {
		Some(NetworkKind::Wifi)
	} else if name.starts_with("en") || name.starts_with("eth") {
		Some(NetworkKind::Ethernet)
	} else if name.starts_with("ww") || name.starts_with("rmnet") {
		Some(NetworkKind::Cellular)
	} else {
		None
	}
}

/// Pick the connection to report from the kinds of all usable interfaces
///
/// Wi-Fi wins over Ethernet, which wins over cellular.
pub fn preferred_network<I>(kinds: I) -> NetworkKind
where
	I: IntoIterator<Item = NetworkKind>,
{
	let mut best = NetworkKind::Offline;
	for kind in kinds {
		let rank = |k: NetworkKind| match k {
			NetworkKind::Wifi => 3,
			NetworkKind::Ethernet => 2,
			NetworkKind::Cellular => 1,
			NetworkKind::Offline => 0,
		};
		if rank(kind) > rank(best) {
			best = kind;
		}
	}
	best
}

fn read_trimmed(path: &Path) -> Option<String> {
	fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Read power state from a sysfs `power_supply` directory
pub fn read_power_supply(root: &Path) -> PowerState {
	let entries = match fs::read_dir(root) {
		Ok(e) => e,
		Err(_) => return PowerState::Unknown,
	};

	let mut battery: Option<PowerState> = None;
	for entry in entries.flatten() {
		let dir = entry.path();
		let kind = read_trimmed(&dir.join("type")).unwrap_or_default();
		match kind.as_str() {
			"Mains" | "USB" => {
				if read_trimmed(&dir.join("online")).as_deref() == Some("1") {
					return PowerState::External;
				}
			}
			"Battery" => {
				let status = read_trimmed(&dir.join("status")).unwrap_or_default();
				if status == "Charging" || status == "Full" {
					return PowerState::External;
				}
				let capacity =
					read_trimmed(&dir.join("capacity")).and_then(|c| c.parse::<u8>().ok());
				let low = capacity.map(|c| c < LOW_BATTERY_PERCENT).unwrap_or(false);
				battery = Some(PowerState::Battery { low });
			}
			_ => {}
		}
	}
	battery.unwrap_or(PowerState::Unknown)
}

/// Environment probed from the running system
pub struct SystemEnvironment {
	assume_network: Option<NetworkKind>,
	power_supply_root: PathBuf,
}

impl SystemEnvironment {
	pub fn new(assume_network: Option<NetworkKind>) -> Self {
		SystemEnvironment { assume_network, power_supply_root: PathBuf::from(POWER_SUPPLY_ROOT) }
	}
}

impl Environment for SystemEnvironment {
	fn network(&self) -> NetworkKind {
		if let Some(kind) = self.assume_network {
			return kind;
		}

		let networks = sysinfo::Networks::new_with_refreshed_list();
		let kinds = networks.list().iter().filter_map(|(name, data)| {
			let routable = data.ip_networks().iter().any(|ip| !ip.addr.is_loopback());
			if routable {
				classify_interface(name)
			} else {
				None
			}
		});
		let kind = preferred_network(kinds);
		debug!("Detected network: {}", kind);
		kind
	}

	fn power(&self) -> PowerState {
		read_power_supply(&self.power_supply_root)
	}
}


// vim: ts=4
