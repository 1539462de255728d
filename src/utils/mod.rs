//! Utility modules for common functionality

pub mod signal;
pub mod time;

pub use signal::{cancel_on_shutdown, wait_for_shutdown};
pub use time::{epoch_millis, now_millis};

// vim: ts=4
