//! End-to-end sync cycle scenarios against an in-memory remote.

mod helpers;

use helpers::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use gridsync_core::domain::{FileEncoding, SyncStatus, SyncTarget};
use gridsync_core::infrastructure::Event;
use gridsync_core::sync::{SyncOutcome, SyncSummary};
use gridsync_core::{SyncCore, SyncError};

/// A started core with one CSV target against a 2x2 remote grid.
async fn setup() -> (TempDir, Arc<MockRemoteClient>, SyncCore, Uuid, PathBuf) {
	let dir = TempDir::new().unwrap();
	let remote = Arc::new(MockRemoteClient::new());
	remote
		.set_tab("Sheet1", grid(&[&["A", "B"], &["C", "D"]]))
		.await;

	let core = test_core(dir.path(), Arc::clone(&remote)).await;
	let target = csv_target(dir.path());
	let local_path = target.local_path.clone();
	let target_id = core.add_target(target).await.unwrap();

	(dir, remote, core, target_id, local_path)
}

#[tokio::test]
async fn test_first_sync_downloads_remote_grid() {
	let (_dir, remote, core, target_id, local_path) = setup().await;

	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(
		outcome,
		SyncOutcome::Completed(SyncSummary {
			uploaded: 0,
			downloaded: true,
			conflicts: 0,
		})
	);

	let rows = read_local(&local_path, FileEncoding::Csv).await;
	assert_eq!(rows, grid(&[&["A", "B"], &["C", "D"]]));
	assert!(remote.pushed_updates().await.is_empty());

	let state = core.target_state(target_id).await;
	assert_eq!(state.status, SyncStatus::Idle);
	assert!(state.last_sync.is_some());
	assert!(state.next_sync.is_some());
}

#[tokio::test]
async fn test_sync_without_changes_is_a_noop() {
	let (_dir, remote, core, target_id, local_path) = setup().await;
	core.sync_now(target_id).await.unwrap();
	let before = std::fs::read_to_string(&local_path).unwrap();

	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(outcome, SyncOutcome::Completed(SyncSummary::default()));
	assert_eq!(std::fs::read_to_string(&local_path).unwrap(), before);
	assert!(remote.pushed_updates().await.is_empty());
}

#[tokio::test]
async fn test_local_edit_is_uploaded() {
	let (_dir, remote, core, target_id, local_path) = setup().await;
	core.sync_now(target_id).await.unwrap();

	write_csv(&local_path, &[&["A", "X"], &["C", "D"]]);

	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(
		outcome,
		SyncOutcome::Completed(SyncSummary {
			uploaded: 1,
			downloaded: false,
			conflicts: 0,
		})
	);

	let pushed = remote.pushed_updates().await;
	assert_eq!(pushed.len(), 1);
	assert_eq!(pushed[0].tab_name, "Sheet1");
	assert_eq!(pushed[0].value, "X");
	assert_eq!(remote.cell("Sheet1", 0, 1).await, "X");
}

#[tokio::test]
async fn test_remote_edit_is_downloaded() {
	let (_dir, remote, core, target_id, local_path) = setup().await;
	core.sync_now(target_id).await.unwrap();

	remote.set_cell("Sheet1", 1, 1, "Z").await;

	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(
		outcome,
		SyncOutcome::Completed(SyncSummary {
			uploaded: 0,
			downloaded: true,
			conflicts: 0,
		})
	);
	let rows = read_local(&local_path, FileEncoding::Csv).await;
	assert_eq!(rows[1][1], "Z");
}

#[tokio::test]
async fn test_conflict_remote_wins_and_is_backed_up() {
	let (_dir, remote, core, target_id, local_path) = setup().await;
	core.sync_now(target_id).await.unwrap();

	// Both sides edit the same cell since the baseline
	write_csv(&local_path, &[&["A", "X"], &["C", "D"]]);
	remote.set_cell("Sheet1", 0, 1, "Y").await;

	let mut events = core.events.subscribe();
	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(
		outcome,
		SyncOutcome::Completed(SyncSummary {
			uploaded: 0,
			downloaded: true,
			conflicts: 1,
		})
	);

	// Remote value stands everywhere; the losing edit was never uploaded
	assert_eq!(remote.cell("Sheet1", 0, 1).await, "Y");
	assert!(remote.pushed_updates().await.is_empty());
	let rows = read_local(&local_path, FileEncoding::Csv).await;
	assert_eq!(rows[0][1], "Y");

	let mut saw_conflict_event = false;
	while let Ok(event) = events.try_recv() {
		if let Event::ConflictsResolved { count, rule, .. } = event {
			assert_eq!(count, 1);
			assert_eq!(rule, "remote-wins");
			saw_conflict_event = true;
		}
	}
	assert!(saw_conflict_event, "no ConflictsResolved event emitted");

	// The pre-merge local state was backed up before being overwritten
	let backups = core.backups(target_id).await.unwrap();
	assert_eq!(backups.len(), 1);
}

#[tokio::test]
async fn test_local_deletion_is_restored_not_uploaded() {
	let (_dir, remote, core, target_id, local_path) = setup().await;
	core.sync_now(target_id).await.unwrap();

	// Clear one cell locally
	write_csv(&local_path, &[&["A", "B"], &["", "D"]]);

	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(
		outcome,
		SyncOutcome::Completed(SyncSummary {
			uploaded: 0,
			downloaded: true,
			conflicts: 0,
		})
	);

	// The remote keeps its value and the local file gets it back
	assert_eq!(remote.cell("Sheet1", 1, 0).await, "C");
	assert!(remote.pushed_updates().await.is_empty());
	let rows = read_local(&local_path, FileEncoding::Csv).await;
	assert_eq!(rows[1][0], "C");
}

#[tokio::test]
async fn test_declined_first_sync_pauses_target() {
	let dir = TempDir::new().unwrap();
	let remote = Arc::new(MockRemoteClient::new());
	remote.set_tab("Sheet1", grid(&[&["A"]])).await;

	let target = csv_target(dir.path());
	write_csv(&target.local_path, &[&["precious", "data"]]);
	let before = std::fs::read_to_string(&target.local_path).unwrap();

	let core = SyncCore::new_with_confirmer(
		data_dir(dir.path()),
		Arc::new(MockAuthProvider::new()),
		Arc::clone(&remote) as Arc<dyn gridsync_core::remote::RemoteClient>,
		Arc::new(DenyOverwrite),
	)
	.await
	.unwrap();
	let local_path = target.local_path.clone();
	let target_id = core.add_target(target).await.unwrap();

	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(outcome, SyncOutcome::Paused);
	assert_eq!(core.target_state(target_id).await.status, SyncStatus::Paused);
	assert_eq!(std::fs::read_to_string(&local_path).unwrap(), before);
}

#[tokio::test]
async fn test_concurrent_syncs_are_single_flight() {
	let (_dir, remote, core, target_id, _local_path) = setup().await;
	remote
		.set_response_delay(Some(Duration::from_millis(300)))
		.await;

	let core = Arc::new(core);
	let first = tokio::spawn({
		let core = Arc::clone(&core);
		async move { core.sync_now(target_id).await }
	});
	// Give the first sync time to take the slot
	tokio::time::sleep(Duration::from_millis(50)).await;
	let second = core.sync_now(target_id).await;

	assert!(matches!(second, Err(SyncError::AlreadySyncing(_))));
	assert!(first.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_unknown_and_disabled_targets_are_rejected() {
	let (dir, _remote, core, _target_id, _local_path) = setup().await;

	let unknown = core.sync_now(Uuid::new_v4()).await;
	assert!(matches!(unknown, Err(SyncError::TargetNotFound(_))));

	let mut disabled = csv_target(dir.path());
	disabled.local_path = dir.path().join("other.csv");
	disabled.enabled = false;
	let disabled_id = core.add_target(disabled).await.unwrap();
	let result = core.sync_now(disabled_id).await;
	assert!(matches!(result, Err(SyncError::TargetDisabled(_))));
}

#[tokio::test]
async fn test_network_failure_sets_error_state_and_recovers() {
	let (_dir, remote, core, target_id, _local_path) = setup().await;
	core.sync_now(target_id).await.unwrap();

	remote.set_fail_mode(Some(FailMode::Network)).await;
	let result = core.sync_now(target_id).await;
	assert!(result.is_err());

	let state = core.target_state(target_id).await;
	assert_eq!(state.status, SyncStatus::Error);
	assert!(state.last_error.is_some());

	remote.set_fail_mode(None).await;
	core.sync_now(target_id).await.unwrap();
	let state = core.target_state(target_id).await;
	assert_eq!(state.status, SyncStatus::Idle);
	assert!(state.last_error.is_none());
}

#[tokio::test]
async fn test_rate_limit_sets_its_own_status() {
	let (_dir, remote, core, target_id, _local_path) = setup().await;
	core.sync_now(target_id).await.unwrap();

	remote.set_fail_mode(Some(FailMode::RateLimited)).await;
	let result = core.sync_now(target_id).await;
	assert!(result.is_err());
	assert_eq!(
		core.target_state(target_id).await.status,
		SyncStatus::RateLimited
	);
}

#[tokio::test]
async fn test_out_of_bounds_rows_stay_local_only() {
	let (_dir, remote, core, target_id, local_path) = setup().await;
	core.sync_now(target_id).await.unwrap();

	// The remote only accepts writes within its reported two rows
	remote.set_row_bound("Sheet1", 2).await;
	write_csv(&local_path, &[&["A", "B"], &["C", "D"], &["E", "F"]]);

	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(
		outcome,
		SyncOutcome::Completed(SyncSummary {
			uploaded: 0,
			downloaded: false,
			conflicts: 0,
		})
	);
	assert!(remote.pushed_updates().await.is_empty());

	// The skipped rows are re-detected and re-skipped, never uploaded
	let again = core.sync_now(target_id).await.unwrap();
	assert_eq!(again, SyncOutcome::Completed(SyncSummary::default()));
	assert!(remote.pushed_updates().await.is_empty());

	// A later remote edit must not read the skipped rows as remote
	// deletions: the local file keeps them across the write-back
	remote.set_cell("Sheet1", 0, 0, "changed").await;
	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(
		outcome,
		SyncOutcome::Completed(SyncSummary {
			uploaded: 0,
			downloaded: true,
			conflicts: 0,
		})
	);
	let rows = read_local(&local_path, FileEncoding::Csv).await;
	assert_eq!(rows[0][0], "changed");
	assert_eq!(rows[2], vec!["E".to_string(), "F".to_string()]);
	assert!(remote.pushed_updates().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retries_once_without_stacking() {
	let (_dir, remote, core, target_id, _local_path) = setup().await;
	core.sync_now(target_id).await.unwrap();

	remote.set_fail_mode(Some(FailMode::Network)).await;
	let mut events = core.events.subscribe();

	// Two manual failures while the failure persists; the second must not
	// queue a second retry
	assert!(core.sync_now(target_id).await.is_err());
	assert!(core.sync_now(target_id).await.is_err());

	// Past the retry delay the single queued retry fires and fails too
	tokio::time::sleep(Duration::from_secs(61)).await;

	let mut failures = 0;
	while let Ok(event) = events.try_recv() {
		if matches!(event, Event::SyncFailed { .. }) {
			failures += 1;
		}
	}
	assert_eq!(failures, 3, "expected two manual failures plus one retry");
}

#[tokio::test]
async fn test_removal_mid_sync_leaves_no_state_behind() {
	let (_dir, remote, core, target_id, _local_path) = setup().await;
	remote
		.set_response_delay(Some(Duration::from_millis(300)))
		.await;

	let core = Arc::new(core);
	let running = tokio::spawn({
		let core = Arc::clone(&core);
		async move { core.sync_now(target_id).await }
	});
	// Let the sync get past its guards, then pull the target out from
	// under it
	tokio::time::sleep(Duration::from_millis(50)).await;
	core.remove_target(target_id, false).await.unwrap();
	let _ = running.await.unwrap();

	// The finished sync must not have re-created state for the dead id
	let state = core.target_state(target_id).await;
	assert_eq!(state.status, SyncStatus::Idle);
	assert!(state.last_sync.is_none());
	assert!(state.last_error.is_none());
}

#[tokio::test]
async fn test_new_remote_tab_respects_sync_new_tabs() {
	let dir = TempDir::new().unwrap();
	let remote = Arc::new(MockRemoteClient::new());
	remote.set_tab("Sheet1", grid(&[&["A"]])).await;

	let core = test_core(dir.path(), Arc::clone(&remote)).await;
	let mut target = SyncTarget::new(
		SHEET_ID,
		"Test Sheet",
		dir.path().join("sheet.json"),
		FileEncoding::Json,
	);
	target.backup_policy.enabled = false;
	target.sync_new_tabs = false;
	let local_path = target.local_path.clone();
	let target_id = core.add_target(target).await.unwrap();
	core.sync_now(target_id).await.unwrap();

	// A tab created remotely after setup is ignored while sync_new_tabs is
	// off
	remote.set_tab("Extra", grid(&[&["new"]])).await;
	let outcome = core.sync_now(target_id).await.unwrap();
	assert_eq!(outcome, SyncOutcome::Completed(SyncSummary::default()));

	let gateway = gridsync_core::codec::DefaultFileGateway;
	use gridsync_core::codec::LocalFileGateway;
	let snapshot = gateway
		.read(&local_path, FileEncoding::Json)
		.await
		.unwrap();
	assert_eq!(snapshot.tab_order, vec!["Sheet1"]);

	// Flip the flag and the tab comes down
	let mut updated = core
		.targets()
		.await
		.into_iter()
		.find(|t| t.id == target_id)
		.unwrap();
	updated.sync_new_tabs = true;
	core.update_target(updated).await.unwrap();

	core.sync_now(target_id).await.unwrap();
	let snapshot = gateway
		.read(&local_path, FileEncoding::Json)
		.await
		.unwrap();
	assert_eq!(snapshot.tab_order, vec!["Sheet1", "Extra"]);
}

#[tokio::test]
async fn test_selected_tabs_limit_the_download() {
	let dir = TempDir::new().unwrap();
	let remote = Arc::new(MockRemoteClient::new());
	remote.set_tab("Data", grid(&[&["A"]])).await;
	remote.set_tab("Scratch", grid(&[&["junk"]])).await;

	let core = test_core(dir.path(), Arc::clone(&remote)).await;
	let mut target = SyncTarget::new(
		SHEET_ID,
		"Test Sheet",
		dir.path().join("sheet.json"),
		FileEncoding::Json,
	);
	target.backup_policy.enabled = false;
	target.selected_tabs.insert("Data".to_string());
	let local_path = target.local_path.clone();
	let target_id = core.add_target(target).await.unwrap();

	core.sync_now(target_id).await.unwrap();

	use gridsync_core::codec::LocalFileGateway;
	let snapshot = gridsync_core::codec::DefaultFileGateway
		.read(&local_path, FileEncoding::Json)
		.await
		.unwrap();
	assert_eq!(snapshot.tab_order, vec!["Data"]);
}

#[tokio::test]
async fn test_auth_failure_marks_error_without_touching_files() {
	let dir = TempDir::new().unwrap();
	let remote = Arc::new(MockRemoteClient::new());
	remote.set_tab("Sheet1", grid(&[&["A"]])).await;

	let auth = Arc::new(MockAuthProvider::new());
	auth.fail.store(true, std::sync::atomic::Ordering::SeqCst);

	let core = SyncCore::new(
		data_dir(dir.path()),
		Arc::clone(&auth) as Arc<dyn gridsync_core::remote::AuthProvider>,
		Arc::clone(&remote) as Arc<dyn gridsync_core::remote::RemoteClient>,
	)
	.await
	.unwrap();
	let target = csv_target(dir.path());
	let local_path = target.local_path.clone();
	let target_id = core.add_target(target).await.unwrap();

	let result = core.sync_now(target_id).await;
	assert!(matches!(result, Err(SyncError::Auth(_))));
	assert_eq!(core.target_state(target_id).await.status, SyncStatus::Error);
	assert!(!local_path.exists());
}
