//! gridsync-core: bidirectional sync between remote spreadsheets and local
//! files.
//!
//! [`SyncCore`] is the embedding surface: construct it with an auth provider
//! and a remote client, manage targets through it, and subscribe to its event
//! bus for notifications. Everything else — change detection, conflict
//! resolution, scheduling, file watching, rate limiting, backups — runs
//! behind it.

pub mod backup;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod remote;
pub mod services;
pub mod sync;

pub use error::{Result, SyncError};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backup::BackupManager;
use crate::codec::{DefaultFileGateway, LocalFileGateway};
use crate::config::{AppConfig, TargetStore};
use crate::domain::{BackupMetadata, SyncTarget, TargetState};
use crate::infrastructure::{Event, EventBus};
use crate::remote::{AuthProvider, RemoteClient};
use crate::services::{FileWatcher, RateLimiter, RateLimiterConfig, Services, SyncScheduler};
use crate::sync::{
	AlwaysConfirm, ChangeDetector, FirstSyncConfirmer, SyncEngine, SyncOutcome,
};

/// Top-level context wiring configuration, services, and the sync engine
pub struct SyncCore {
	pub config: AppConfig,
	pub events: Arc<EventBus>,
	pub services: Services,
	engine: Arc<SyncEngine>,
	detector: Arc<ChangeDetector>,
	backups: Arc<BackupManager>,
	loop_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncCore {
	/// Construct a core with the default (always-proceed) first-sync
	/// confirmer.
	pub async fn new(
		data_dir: std::path::PathBuf,
		auth: Arc<dyn AuthProvider>,
		remote: Arc<dyn RemoteClient>,
	) -> Result<Self> {
		Self::new_with_confirmer(data_dir, auth, remote, Arc::new(AlwaysConfirm)).await
	}

	/// Construct a core, restoring persisted targets and starting the
	/// trigger loops. Enabled targets get their timer and file watch back
	/// immediately.
	pub async fn new_with_confirmer(
		data_dir: std::path::PathBuf,
		auth: Arc<dyn AuthProvider>,
		remote: Arc<dyn RemoteClient>,
		confirmer: Arc<dyn FirstSyncConfirmer>,
	) -> Result<Self> {
		let config = AppConfig::load_or_create(&data_dir)?;
		config.ensure_directories()?;

		let events = Arc::new(EventBus::default());
		let rate_limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
			reads_per_minute: config.reads_per_minute,
			writes_per_minute: config.writes_per_minute,
		}));
		let (scheduler, scheduler_rx) = SyncScheduler::new();
		let (file_watcher, watcher_rx) = FileWatcher::new();
		let services = Services {
			file_watcher: Arc::new(file_watcher),
			scheduler: Arc::new(scheduler),
			rate_limiter: Arc::clone(&rate_limiter),
		};

		let gateway: Arc<dyn LocalFileGateway> = Arc::new(DefaultFileGateway);
		let detector = Arc::new(ChangeDetector::new(config.baselines_dir()));
		let backups = Arc::new(BackupManager::new(
			config.backups_dir(),
			config.backup_index_path(),
			config.backup_budget_bytes,
			Arc::clone(&gateway),
			Arc::clone(&events),
		));

		let engine = Arc::new(SyncEngine::new(
			auth,
			remote,
			gateway,
			Arc::clone(&detector),
			rate_limiter,
			Arc::clone(&backups),
			Arc::clone(&events),
			confirmer,
			TargetStore::new(config.targets_path()),
		)?);
		let loop_handles = Arc::clone(&engine).start(scheduler_rx, watcher_rx);

		let core = Self {
			config,
			events,
			services,
			engine,
			detector,
			backups,
			loop_handles: Mutex::new(loop_handles),
		};

		let targets = core.engine.targets().await;
		for target in &targets {
			if target.enabled {
				core.register_triggers(target).await;
			}
		}

		core.events.emit(Event::CoreStarted);
		info!("Core started with {} target(s)", targets.len());
		Ok(core)
	}

	/// Add a new sync target. Its timer and file watch start immediately
	/// when the target is enabled.
	pub async fn add_target(&self, target: SyncTarget) -> Result<Uuid> {
		let target_id = target.id;
		let local_path = target.local_path.clone();
		let enabled = target.enabled;

		self.engine.upsert_target(target.clone()).await?;
		if enabled {
			self.register_triggers(&target).await;
		}

		self.events.emit(Event::TargetAdded {
			target_id,
			local_path,
		});
		info!("Added sync target {}", target_id);
		Ok(target_id)
	}

	/// Replace a target's configuration, rewiring its triggers to match.
	pub async fn update_target(&self, target: SyncTarget) -> Result<()> {
		let target_id = target.id;
		if self.engine.target(target_id).await.is_none() {
			return Err(SyncError::TargetNotFound(target_id));
		}

		self.engine.upsert_target(target.clone()).await?;
		if target.enabled {
			self.register_triggers(&target).await;
		} else {
			self.services.scheduler.cancel(target_id).await;
			self.services.file_watcher.unwatch(target_id).await;
		}
		Ok(())
	}

	/// Remove a target along with its baseline; backups go too when
	/// `delete_backups` is set.
	pub async fn remove_target(&self, target_id: Uuid, delete_backups: bool) -> Result<()> {
		self.services.scheduler.cancel(target_id).await;
		self.services.file_watcher.unwatch(target_id).await;

		self.engine.remove_target(target_id).await?;
		self.detector.delete_snapshot(target_id).await?;
		if delete_backups {
			self.backups.delete_all_backups_for_target(target_id).await?;
		}

		self.events.emit(Event::TargetRemoved { target_id });
		info!("Removed sync target {}", target_id);
		Ok(())
	}

	/// All configured targets.
	pub async fn targets(&self) -> Vec<SyncTarget> {
		self.engine.targets().await
	}

	/// Runtime state of one target.
	pub async fn target_state(&self, target_id: Uuid) -> TargetState {
		self.engine.state(target_id).await
	}

	/// Run a sync cycle for a target right now, outside its timer.
	pub async fn sync_now(&self, target_id: Uuid) -> Result<SyncOutcome> {
		Arc::clone(&self.engine).perform_sync(target_id).await
	}

	/// Backups of a target, newest first.
	pub async fn backups(&self, target_id: Uuid) -> Result<Vec<BackupMetadata>> {
		Ok(self.backups.backups_for_target(target_id).await?)
	}

	/// Restore a backup over the target's local file. The next sync will
	/// treat restored values as local edits.
	pub async fn restore_backup(&self, target_id: Uuid, backup_id: Uuid) -> Result<()> {
		let target = self
			.engine
			.target(target_id)
			.await
			.ok_or(SyncError::TargetNotFound(target_id))?;
		let metadata = self
			.backups
			.backups_for_target(target_id)
			.await?
			.into_iter()
			.find(|m| m.id == backup_id)
			.ok_or(SyncError::Backup(backup::BackupError::NotFound(backup_id)))?;
		self.backups
			.restore_backup(&metadata, &target.local_path)
			.await?;
		Ok(())
	}

	/// Stop trigger loops and services. In-flight syncs finish on their own.
	pub async fn shutdown(&self) {
		info!("Shutting down core");
		self.events.emit(Event::CoreShutdown);
		self.services.stop_all().await;
		for handle in self.loop_handles.lock().await.drain(..) {
			handle.abort();
		}
	}

	async fn register_triggers(&self, target: &SyncTarget) {
		self.services
			.scheduler
			.schedule(
				target.id,
				Duration::from_secs(target.effective_interval_secs()),
			)
			.await;
		if let Err(e) = self
			.services
			.file_watcher
			.watch(target.id, &target.local_path)
			.await
		{
			// Watch failures degrade to timer-only syncing
			warn!(
				"Could not watch {:?} for target {}: {}",
				target.local_path, target.id, e
			);
		}
	}
}
