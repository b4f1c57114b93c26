// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background refresh of the cached snapshot.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::cache::SnapshotStatus;
use crate::config::SnapshotConfig;
use crate::error::Result;
use crate::loader::SnapshotLoader;

/// Starts the periodic refresh task.
pub struct SnapshotRefresher;

impl SnapshotRefresher {
	/// Optionally performs the initial load, then spawns the periodic task.
	///
	/// A failing initial load is returned to the caller; failures of later
	/// periodic loads are logged and the previous snapshot keeps serving.
	#[instrument(skip(loader, config), fields(interval_secs = config.refresh_interval_secs))]
	pub async fn start(
		loader: Arc<SnapshotLoader>,
		config: &SnapshotConfig,
	) -> Result<RefreshHandle> {
		config.validate()?;

		if config.load_on_start {
			loader.load().await?;
		}

		let (shutdown_tx, _) = broadcast::channel(1);
		let task = if config.refresh_enabled {
			Some(spawn_refresh_loop(
				Arc::clone(&loader),
				config,
				shutdown_tx.subscribe(),
			))
		} else {
			debug!("periodic snapshot refresh disabled");
			None
		};

		Ok(RefreshHandle {
			loader,
			shutdown_tx,
			task,
		})
	}
}

fn spawn_refresh_loop(
	loader: Arc<SnapshotLoader>,
	config: &SnapshotConfig,
	mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
	let period = config.refresh_interval();

	tokio::spawn(async move {
		let mut ticker = interval_at(Instant::now() + period, period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					if let Err(e) = loader.load().await {
						warn!(error = %e, "snapshot refresh failed, keeping previous snapshot");
					}
				}
				_ = shutdown_rx.recv() => {
					info!("shutting down snapshot refresher");
					break;
				}
			}
		}
	})
}

/// Controls a running refresher.
pub struct RefreshHandle {
	loader: Arc<SnapshotLoader>,
	shutdown_tx: broadcast::Sender<()>,
	task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
	/// Reloads immediately, e.g. after an admin write.
	pub async fn refresh_now(&self) -> Result<SnapshotStatus> {
		debug!("manual snapshot refresh requested");
		self.loader.load().await
	}

	pub fn status(&self) -> SnapshotStatus {
		self.loader.store().status()
	}

	pub fn is_running(&self) -> bool {
		self.task.as_ref().is_some_and(|t| !t.is_finished())
	}

	/// Stops the periodic task and waits for it to exit.
	pub async fn shutdown(mut self) {
		let _ = self.shutdown_tx.send(());
		if let Some(task) = self.task.take() {
			if let Err(e) = task.await {
				warn!(error = %e, "snapshot refresher task ended abnormally");
			}
		}
	}
}
