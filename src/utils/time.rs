//! Wall-clock helpers

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the epoch, zero for pre-epoch or unknown times
pub fn epoch_millis(time: SystemTime) -> u64 {
	time.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

pub fn now_millis() -> u64 {
	epoch_millis(SystemTime::now())
}


// vim: ts=4
