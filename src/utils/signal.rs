//! Termination signals

use tokio_util::sync::CancellationToken;

use crate::logging::*;

/// Resolve on SIGINT or SIGTERM (Ctrl-C elsewhere)
#[cfg(unix)]
pub async fn wait_for_shutdown() {
	use tokio::signal::unix::{signal, SignalKind};

	let mut sigterm = match signal(SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}. Only SIGINT stops the agent.", e);
			if let Err(e) = tokio::signal::ctrl_c().await {
				warn!("Failed to wait for SIGINT: {}", e);
			}
			return;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => debug!("Received SIGTERM"),
		result = tokio::signal::ctrl_c() => match result {
			Ok(()) => debug!("Received SIGINT"),
			Err(e) => warn!("Failed to wait for SIGINT: {}", e),
		},
	}
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		warn!("Failed to wait for Ctrl-C: {}", e);
	}
}

/// Cancel `token` when a termination signal arrives
pub fn cancel_on_shutdown(token: CancellationToken) {
	tokio::spawn(async move {
		wait_for_shutdown().await;
		info!("Shutdown requested, finishing the current file");
		token.cancel();
	});
}

// vim: ts=4
