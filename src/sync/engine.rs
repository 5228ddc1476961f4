//! Sync orchestration
//!
//! One sync cycle: auth pre-flight, local writability check, remote fetch,
//! change detection against the persisted baseline, conflict resolution,
//! upload, local write-back, and only then the new baseline. The baseline is
//! persisted strictly after both sides have been updated; a crash anywhere
//! earlier leaves the previous baseline intact and the cycle replays.
//!
//! Failures are split into transient (network, rate limit, file lock) and
//! permanent. Transient failures get exactly one delayed retry per target;
//! retries never stack. Permanent failures wait for the next timer tick or a
//! user action.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backup::BackupManager;
use crate::codec::LocalFileGateway;
use crate::config::TargetStore;
use crate::domain::{
	CellSnapshot, ChangeSource, FileEncoding, SheetSnapshot, SyncStatus, SyncTarget, TargetState,
};
use crate::error::{Result, SyncError};
use crate::infrastructure::{Event, EventBus};
use crate::remote::{AuthProvider, CellUpdate, RemoteClient, RemoteError, SheetMetadata};
use crate::services::RateLimiter;
use crate::sync::detector::ChangeDetector;
use crate::sync::resolver::{ConflictResolver, WINNER_RULE};

/// Attempts to open the local file for writing before giving up
const WRITABILITY_RETRIES: u32 = 3;
const WRITABILITY_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Deadline for any single remote call
const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before the single transient-failure retry
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Quiet period after a file-change burst before syncing
const FILE_EVENT_DEBOUNCE: Duration = Duration::from_secs(2);

/// File events this close after a completed sync are our own write-back
const POST_SYNC_COOLDOWN: Duration = Duration::from_secs(5);

/// Asks the user before the first download overwrites an existing local file.
/// The concrete implementation lives with the UI; headless use gets
/// [`AlwaysConfirm`].
#[async_trait]
pub trait FirstSyncConfirmer: Send + Sync {
	async fn confirm_overwrite(&self, target: &SyncTarget) -> bool;
}

/// Confirmer that always proceeds
pub struct AlwaysConfirm;

#[async_trait]
impl FirstSyncConfirmer for AlwaysConfirm {
	async fn confirm_overwrite(&self, _target: &SyncTarget) -> bool {
		true
	}
}

/// What a completed cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
	/// Cells uploaded to the remote
	pub uploaded: usize,

	/// Whether the local file was rewritten
	pub downloaded: bool,

	/// Conflicts resolved this cycle
	pub conflicts: usize,
}

/// Result of a sync attempt that ran to a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
	Completed(SyncSummary),

	/// First-sync overwrite confirmation was declined
	Paused,
}

pub struct SyncEngine {
	auth: Arc<dyn AuthProvider>,
	remote: Arc<dyn RemoteClient>,
	gateway: Arc<dyn LocalFileGateway>,
	detector: Arc<ChangeDetector>,
	resolver: ConflictResolver,
	rate_limiter: Arc<RateLimiter>,
	backups: Arc<BackupManager>,
	events: Arc<EventBus>,
	confirmer: Arc<dyn FirstSyncConfirmer>,

	target_store: TargetStore,
	targets: RwLock<HashMap<Uuid, SyncTarget>>,
	states: RwLock<HashMap<Uuid, TargetState>>,

	/// At most one running sync per target
	in_flight: Mutex<HashSet<Uuid>>,

	/// Targets with a transient-failure retry already queued
	retry_pending: Mutex<HashSet<Uuid>>,

	/// Targets inside a file-change debounce window
	debounce_pending: Mutex<HashSet<Uuid>>,

	/// Completion instants, for the post-sync cooldown
	last_completed: Mutex<HashMap<Uuid, Instant>>,
}

impl SyncEngine {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		auth: Arc<dyn AuthProvider>,
		remote: Arc<dyn RemoteClient>,
		gateway: Arc<dyn LocalFileGateway>,
		detector: Arc<ChangeDetector>,
		rate_limiter: Arc<RateLimiter>,
		backups: Arc<BackupManager>,
		events: Arc<EventBus>,
		confirmer: Arc<dyn FirstSyncConfirmer>,
		target_store: TargetStore,
	) -> Result<Self> {
		let targets: HashMap<Uuid, SyncTarget> = target_store
			.load()?
			.into_iter()
			.map(|t| (t.id, t))
			.collect();

		Ok(Self {
			auth,
			remote,
			gateway,
			detector,
			resolver: ConflictResolver,
			rate_limiter,
			backups,
			events,
			confirmer,
			target_store,
			targets: RwLock::new(targets),
			states: RwLock::new(HashMap::new()),
			in_flight: Mutex::new(HashSet::new()),
			retry_pending: Mutex::new(HashSet::new()),
			debounce_pending: Mutex::new(HashSet::new()),
			last_completed: Mutex::new(HashMap::new()),
		})
	}

	/// Spawn the trigger loops: periodic timer ticks and debounced file
	/// change events. Both loops end when their channel closes.
	pub fn start(
		self: Arc<Self>,
		mut scheduler_rx: mpsc::UnboundedReceiver<Uuid>,
		mut watcher_rx: mpsc::UnboundedReceiver<Uuid>,
	) -> Vec<JoinHandle<()>> {
		let timer_engine = Arc::clone(&self);
		let timer_loop = tokio::spawn(async move {
			while let Some(target_id) = scheduler_rx.recv().await {
				let engine = Arc::clone(&timer_engine);
				tokio::spawn(async move {
					if let Err(e) = engine.perform_sync(target_id).await {
						debug!("Timer-triggered sync for {} ended: {}", target_id, e);
					}
				});
			}
			debug!("Scheduler channel closed; timer loop exiting");
		});

		let watch_engine = Arc::clone(&self);
		let watch_loop = tokio::spawn(async move {
			while let Some(target_id) = watcher_rx.recv().await {
				watch_engine.events.emit(Event::LocalFileChanged { target_id });
				Self::spawn_debounced_sync(Arc::clone(&watch_engine), target_id);
			}
			debug!("Watcher channel closed; watch loop exiting");
		});

		vec![timer_loop, watch_loop]
	}

	/// Debounce a file-change burst, then sync unless the change was our own
	/// write-back landing within the cooldown window.
	fn spawn_debounced_sync(engine: Arc<Self>, target_id: Uuid) {
		tokio::spawn(async move {
			{
				let mut pending = engine.debounce_pending.lock().await;
				if !pending.insert(target_id) {
					return;
				}
			}
			tokio::time::sleep(FILE_EVENT_DEBOUNCE).await;
			engine.debounce_pending.lock().await.remove(&target_id);

			let own_write_back = engine
				.last_completed
				.lock()
				.await
				.get(&target_id)
				.map(|at| at.elapsed() < POST_SYNC_COOLDOWN)
				.unwrap_or(false);
			if own_write_back {
				debug!("Ignoring file change for {} inside post-sync cooldown", target_id);
				return;
			}

			if let Err(e) = engine.perform_sync(target_id).await {
				debug!("File-triggered sync for {} ended: {}", target_id, e);
			}
		});
	}

	// --- target management ---

	/// Add or replace a target and persist the target list.
	pub async fn upsert_target(&self, target: SyncTarget) -> Result<()> {
		self.targets.write().await.insert(target.id, target);
		self.save_targets().await
	}

	/// Remove a target; its runtime state goes with it.
	pub async fn remove_target(&self, target_id: Uuid) -> Result<SyncTarget> {
		let removed = self
			.targets
			.write()
			.await
			.remove(&target_id)
			.ok_or(SyncError::TargetNotFound(target_id))?;
		self.states.write().await.remove(&target_id);
		self.last_completed.lock().await.remove(&target_id);
		self.save_targets().await?;
		Ok(removed)
	}

	pub async fn target(&self, target_id: Uuid) -> Option<SyncTarget> {
		self.targets.read().await.get(&target_id).cloned()
	}

	pub async fn targets(&self) -> Vec<SyncTarget> {
		self.targets.read().await.values().cloned().collect()
	}

	/// Runtime state of a target; defaults to idle-never-synced.
	pub async fn state(&self, target_id: Uuid) -> TargetState {
		self.states
			.read()
			.await
			.get(&target_id)
			.cloned()
			.unwrap_or_default()
	}

	async fn save_targets(&self) -> Result<()> {
		let targets: Vec<SyncTarget> = self.targets.read().await.values().cloned().collect();
		self.target_store.save(&targets)?;
		Ok(())
	}

	// --- the sync cycle ---

	/// Run one full sync cycle for a target.
	///
	/// Disabled targets and targets already mid-sync return an error without
	/// touching runtime state; trigger loops treat those as a no-op.
	pub async fn perform_sync(self: Arc<Self>, target_id: Uuid) -> Result<SyncOutcome> {
		let target = self
			.target(target_id)
			.await
			.ok_or(SyncError::TargetNotFound(target_id))?;
		if !target.enabled {
			return Err(SyncError::TargetDisabled(target_id));
		}
		if !self.in_flight.lock().await.insert(target_id) {
			debug!("Sync already in flight for target {}", target_id);
			return Err(SyncError::AlreadySyncing(target_id));
		}

		self.set_status(target_id, SyncStatus::Syncing).await;
		self.events.emit(Event::SyncStarted { target_id });
		info!(
			"Syncing target {} ({} <-> {:?})",
			target_id, target.remote_sheet_name, target.local_path
		);

		let result = self.sync_target(&target).await;
		self.in_flight.lock().await.remove(&target_id);

		match result {
			Ok(SyncOutcome::Completed(summary)) => {
				self.mark_completed(&target, summary).await;
				info!(
					"Sync completed for target {}: {} uploaded, downloaded={}, {} conflict(s)",
					target_id, summary.uploaded, summary.downloaded, summary.conflicts
				);
				Ok(SyncOutcome::Completed(summary))
			}
			Ok(SyncOutcome::Paused) => {
				self.set_status(target_id, SyncStatus::Paused).await;
				Ok(SyncOutcome::Paused)
			}
			Err(e) => {
				self.note_failure(target_id, &e).await;
				if e.is_transient() {
					Self::schedule_retry(Arc::clone(&self), target_id);
				}
				Err(e)
			}
		}
	}

	async fn sync_target(&self, target: &SyncTarget) -> Result<SyncOutcome> {
		// Auth first: without a credential nothing else is worth attempting
		self.auth.get_valid_token().await?;

		self.ensure_writable(&target.local_path).await?;

		let baseline = self.detector.get_snapshot(target.id).await?;
		let (metadata, remote_snapshot) = self.fetch_remote(target, baseline.as_ref()).await?;

		match baseline {
			None => self.first_sync(target, &remote_snapshot).await,
			Some(baseline) => {
				self.incremental_sync(target, &baseline, &metadata, &remote_snapshot)
					.await
			}
		}
	}

	/// First sync: the remote is authoritative, nothing is uploaded.
	async fn first_sync(
		&self,
		target: &SyncTarget,
		remote_snapshot: &SheetSnapshot,
	) -> Result<SyncOutcome> {
		if target.local_path.exists()
			&& !self.confirmer.confirm_overwrite(target).await
		{
			warn!(
				"First-sync overwrite of {:?} declined; pausing target {}",
				target.local_path, target.id
			);
			return Ok(SyncOutcome::Paused);
		}

		self.gateway
			.write(remote_snapshot, &target.local_path, target.file_encoding, &[])
			.await?;
		self.detector.save_snapshot(target.id, remote_snapshot).await?;

		info!(
			"First sync for target {}: downloaded {} tab(s), {} non-empty cell(s)",
			target.id,
			remote_snapshot.tab_order.len(),
			remote_snapshot.non_empty_cells()
		);
		Ok(SyncOutcome::Completed(SyncSummary {
			uploaded: 0,
			downloaded: true,
			conflicts: 0,
		}))
	}

	async fn incremental_sync(
		&self,
		target: &SyncTarget,
		baseline: &SheetSnapshot,
		metadata: &SheetMetadata,
		remote_snapshot: &SheetSnapshot,
	) -> Result<SyncOutcome> {
		// A local read failure is tolerated: the cycle degrades to
		// download-only rather than failing outright
		let local_snapshot = match self
			.gateway
			.read(&target.local_path, target.file_encoding)
			.await
		{
			Ok(snapshot) => Some(align_tab_names(snapshot, remote_snapshot, target.file_encoding)),
			Err(e) => {
				warn!(
					"Local read failed for target {}; treating as no local changes: {}",
					target.id, e
				);
				None
			}
		};

		let local_changes = match &local_snapshot {
			None => Vec::new(),
			Some(local) => {
				// An entirely empty read against a non-empty baseline is a
				// truncated file or a mid-write race, not a mass deletion
				if local.non_empty_cells() == 0 && baseline.non_empty_cells() > 0 {
					warn!(
						"Local file for target {} read back empty against a non-empty baseline; ignoring local side this cycle",
						target.id
					);
					Vec::new()
				} else {
					self.detector
						.detect_changes(local, Some(baseline), ChangeSource::Local)
				}
			}
		};
		let remote_changes =
			self.detector
				.detect_changes(remote_snapshot, Some(baseline), ChangeSource::Remote);

		if local_changes.is_empty() && remote_changes.is_empty() {
			debug!("No changes for target {}", target.id);
			return Ok(SyncOutcome::Completed(SyncSummary::default()));
		}
		debug!(
			"Target {}: {} local change(s), {} remote change(s)",
			target.id,
			local_changes.len(),
			remote_changes.len()
		);

		let resolution = self
			.resolver
			.resolve(&local_changes, &remote_changes, remote_snapshot);

		// Conflicts overwrite local values; keep the pre-merge state
		// recoverable. Backup failures never fail the sync.
		if !resolution.conflicts.is_empty() {
			if let Some(local) = &local_snapshot {
				if let Err(e) = self.backups.create_backup(target, local).await {
					warn!("Pre-merge backup failed for target {}: {}", target.id, e);
					self.events.emit(Event::BackupFailed {
						target_id: target.id,
						error: e.to_string(),
					});
				}
			}
		}

		let (uploaded, skipped) = self
			.push_updates(target, metadata, &resolution.changes_to_upload)
			.await?;

		let downloaded = resolution.has_local_updates;
		if downloaded {
			self.gateway
				.write(
					&resolution.merged_snapshot,
					&target.local_path,
					target.file_encoding,
					&[],
				)
				.await?;
		}

		// Both sides updated; only now does the merged state become the
		// baseline. Cells the remote refused stay in the local file but are
		// cleared from the baseline: the remote never had them, and a
		// baseline that pretends otherwise would read the remote's next
		// snapshot as a deletion of the user's rows.
		let new_baseline = if skipped.is_empty() {
			resolution.merged_snapshot.clone()
		} else {
			resolution.merged_snapshot.with_cells(
				skipped
					.iter()
					.map(|u| (u.tab_name.clone(), u.row, u.col, String::new())),
			)
		};
		self.detector.save_snapshot(target.id, &new_baseline).await?;

		if !resolution.conflicts.is_empty() {
			for conflict in &resolution.conflicts {
				warn!(
					"Conflict at {}: local {:?} lost to remote {:?}",
					conflict.address, conflict.local_value, conflict.remote_value
				);
			}
			self.events.emit(Event::ConflictsResolved {
				target_id: target.id,
				count: resolution.conflicts.len(),
				rule: WINNER_RULE,
			});
		}

		// Periodic backup, only when the remote actually moved
		if !remote_changes.is_empty() && target.backup_policy.is_due(Utc::now()) {
			match self
				.backups
				.create_backup(target, &resolution.merged_snapshot)
				.await
			{
				Ok(_) => self.record_backup_time(target.id).await?,
				Err(e) => {
					warn!("Periodic backup failed for target {}: {}", target.id, e);
					self.events.emit(Event::BackupFailed {
						target_id: target.id,
						error: e.to_string(),
					});
				}
			}
		}

		Ok(SyncOutcome::Completed(SyncSummary {
			uploaded,
			downloaded,
			conflicts: resolution.conflicts.len(),
		}))
	}

	/// Fetch metadata and all participating tab grids.
	async fn fetch_remote(
		&self,
		target: &SyncTarget,
		baseline: Option<&SheetSnapshot>,
	) -> Result<(SheetMetadata, SheetSnapshot)> {
		self.rate_limiter.wait_for_read_slot().await;
		let metadata = self
			.remote_call(self.remote.fetch_sheet_metadata(&target.remote_sheet_id))
			.await?;

		let mut tabs = Vec::new();
		for tab in &metadata.tabs {
			if !target.includes_tab(&tab.name) {
				continue;
			}
			if let Some(baseline) = baseline {
				if !target.sync_new_tabs && baseline.tab(&tab.name).is_none() {
					debug!(
						"Skipping new remote tab {:?} for target {} (sync_new_tabs off)",
						tab.name, target.id
					);
					continue;
				}
			}

			self.rate_limiter.wait_for_read_slot().await;
			let rows = self
				.remote_call(
					self.remote
						.fetch_tab_values(&target.remote_sheet_id, &tab.name),
				)
				.await?;
			tabs.push(CellSnapshot::new(tab.name.clone(), rows));
		}

		self.rate_limiter.report_success().await;
		Ok((
			metadata,
			SheetSnapshot::new(target.remote_sheet_id.clone(), tabs),
		))
	}

	/// Upload the cleared local changes in one batch, skipping any cell that
	/// lies beyond the remote's reported bounds. Skipped cells stay
	/// local-only: they are never uploaded, the caller keeps them out of the
	/// baseline, and each later cycle re-detects and re-skips them with a
	/// warning.
	async fn push_updates(
		&self,
		target: &SyncTarget,
		metadata: &SheetMetadata,
		updates: &[CellUpdate],
	) -> Result<(usize, Vec<CellUpdate>)> {
		let (in_bounds, skipped): (Vec<CellUpdate>, Vec<CellUpdate>) = updates
			.iter()
			.cloned()
			.partition(|u| matches!(metadata.row_count(&u.tab_name), Some(bound) if u.row < bound));

		for u in &skipped {
			match metadata.row_count(&u.tab_name) {
				Some(bound) => warn!(
					"Not uploading {}!r{}c{} for target {}: beyond remote row bound {}",
					u.tab_name, u.row + 1, u.col + 1, target.id, bound
				),
				None => warn!(
					"Not uploading to unknown remote tab {:?} for target {}",
					u.tab_name, target.id
				),
			}
		}

		if in_bounds.is_empty() {
			return Ok((0, skipped));
		}

		self.rate_limiter.wait_for_write_slot().await;
		let count = self
			.remote_call(
				self.remote
					.push_cell_updates(&target.remote_sheet_id, &in_bounds),
			)
			.await?;
		self.rate_limiter.report_success().await;
		debug!("Uploaded {} cell(s) for target {}", count, target.id);
		Ok((count, skipped))
	}

	/// Wrap a remote call with the network deadline and rate-limit reporting.
	async fn remote_call<T>(
		&self,
		fut: impl Future<Output = std::result::Result<T, RemoteError>>,
	) -> Result<T> {
		match tokio::time::timeout(NETWORK_TIMEOUT, fut).await {
			Err(_) => Err(SyncError::Timeout),
			Ok(Err(RemoteError::RateLimited { retry_after })) => {
				self.rate_limiter.report_rate_limited(retry_after).await;
				Err(RemoteError::RateLimited { retry_after }.into())
			}
			Ok(Err(e)) => Err(e.into()),
			Ok(Ok(value)) => Ok(value),
		}
	}

	/// Verify the local file can be opened for writing, retrying briefly.
	/// A missing file is fine; the first sync will create it.
	async fn ensure_writable(&self, path: &Path) -> Result<()> {
		if !path.exists() {
			return Ok(());
		}

		for attempt in 1..=WRITABILITY_RETRIES {
			match std::fs::OpenOptions::new().write(true).open(path) {
				Ok(_) => return Ok(()),
				Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
					debug!(
						"File {:?} locked (attempt {}/{})",
						path, attempt, WRITABILITY_RETRIES
					);
					if attempt < WRITABILITY_RETRIES {
						tokio::time::sleep(WRITABILITY_RETRY_DELAY).await;
					}
				}
				Err(e) => return Err(SyncError::Io(e)),
			}
		}
		Err(SyncError::FileLocked(path.to_path_buf()))
	}

	// --- state bookkeeping ---

	// State bookkeeping holds the targets read lock while touching `states`
	// so a target removed mid-sync never gets a fresh entry re-inserted for
	// its dead id. Lock order (targets, then states) matches `remove_target`.

	async fn set_status(&self, target_id: Uuid, status: SyncStatus) {
		let targets = self.targets.read().await;
		if !targets.contains_key(&target_id) {
			return;
		}
		self.states.write().await.entry(target_id).or_default().status = status;
	}

	async fn mark_completed(&self, target: &SyncTarget, summary: SyncSummary) {
		let now = Utc::now();
		{
			let targets = self.targets.read().await;
			if !targets.contains_key(&target.id) {
				debug!("Target {} removed mid-sync; dropping its state", target.id);
				return;
			}
			let mut states = self.states.write().await;
			let state = states.entry(target.id).or_default();
			state.status = SyncStatus::Idle;
			state.last_sync = Some(now);
			state.next_sync =
				Some(now + chrono::Duration::seconds(target.effective_interval_secs() as i64));
			state.last_error = None;
		}
		self.last_completed
			.lock()
			.await
			.insert(target.id, Instant::now());
		self.events.emit(Event::SyncCompleted {
			target_id: target.id,
			uploaded: summary.uploaded,
			downloaded: summary.downloaded,
			conflicts: summary.conflicts,
		});
	}

	async fn note_failure(&self, target_id: Uuid, error: &SyncError) {
		error!("Sync failed for target {}: {}", target_id, error);
		let status = if error.is_rate_limited() {
			SyncStatus::RateLimited
		} else {
			SyncStatus::Error
		};
		{
			let targets = self.targets.read().await;
			if !targets.contains_key(&target_id) {
				debug!("Target {} removed mid-sync; dropping its state", target_id);
				return;
			}
			let mut states = self.states.write().await;
			let state = states.entry(target_id).or_default();
			state.status = status;
			state.last_error = Some(error.to_string());
		}
		self.events.emit(Event::SyncFailed {
			target_id,
			error: error.to_string(),
		});
	}

	/// Queue the single delayed retry for a transient failure. A retry
	/// already pending for this target means no-op; retries never stack.
	///
	/// Deliberately not async: awaiting this from `perform_sync` would make
	/// the recursive retry future part of `perform_sync`'s own future.
	fn schedule_retry(engine: Arc<Self>, target_id: Uuid) {
		tokio::spawn(async move {
			{
				let mut pending = engine.retry_pending.lock().await;
				if !pending.insert(target_id) {
					debug!("Retry already pending for target {}", target_id);
					return;
				}
			}
			info!(
				"Scheduling retry for target {} in {:?}",
				target_id, TRANSIENT_RETRY_DELAY
			);
			tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
			engine.retry_pending.lock().await.remove(&target_id);
			if let Err(e) = Arc::clone(&engine).perform_sync(target_id).await {
				debug!("Retry for target {} ended: {}", target_id, e);
			}
		});
	}

	/// Record the periodic-backup timestamp on the target and persist it.
	async fn record_backup_time(&self, target_id: Uuid) -> Result<()> {
		{
			let mut targets = self.targets.write().await;
			if let Some(target) = targets.get_mut(&target_id) {
				target.backup_policy.last_backup_at = Some(Utc::now());
			}
		}
		self.save_targets().await
	}
}

/// The CSV codec names its single tab after the file stem; re-align it to
/// the remote's first tab so diffing compares the same tab.
fn align_tab_names(
	local: SheetSnapshot,
	remote: &SheetSnapshot,
	encoding: FileEncoding,
) -> SheetSnapshot {
	if encoding != FileEncoding::Csv {
		return local;
	}
	let (Some(local_name), Some(remote_name)) =
		(local.tab_order.first().cloned(), remote.tab_order.first().cloned())
	else {
		return local;
	};
	if local_name == remote_name {
		return local;
	}
	let Some(tab) = local.tab(&local_name) else {
		return local;
	};
	SheetSnapshot::new(
		local.remote_sheet_id.clone(),
		vec![CellSnapshot::new(remote_name, tab.rows.clone())],
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sheet(tab: &str, rows: &[&[&str]]) -> SheetSnapshot {
		let rows = rows
			.iter()
			.map(|r| r.iter().map(|c| c.to_string()).collect())
			.collect();
		SheetSnapshot::new("sheet-1", vec![CellSnapshot::new(tab, rows)])
	}

	#[test]
	fn test_csv_tab_realigned_to_remote_name() {
		let local = sheet("budget_2024", &[&["A", "B"]]);
		let remote = sheet("Sheet1", &[&["A", "B"]]);

		let aligned = align_tab_names(local, &remote, FileEncoding::Csv);
		assert_eq!(aligned.tab_order, vec!["Sheet1"]);
		assert_eq!(aligned.tab("Sheet1").unwrap().cell(0, 1), Some("B"));
	}

	#[test]
	fn test_workbook_tabs_left_alone() {
		let local = sheet("Data", &[&["A"]]);
		let remote = sheet("Sheet1", &[&["A"]]);

		let aligned = align_tab_names(local, &remote, FileEncoding::Workbook);
		assert_eq!(aligned.tab_order, vec!["Data"]);
	}

	#[test]
	fn test_matching_csv_name_untouched() {
		let local = sheet("Sheet1", &[&["A"]]);
		let remote = sheet("Sheet1", &[&["X"]]);

		let aligned = align_tab_names(local, &remote, FileEncoding::Csv);
		assert_eq!(aligned.tab_order, vec!["Sheet1"]);
		assert_eq!(aligned.tab("Sheet1").unwrap().cell(0, 0), Some("A"));
	}
}
