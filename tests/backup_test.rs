//! Periodic backup policy and restore behavior through the full core.

mod helpers;

use helpers::*;
use std::sync::Arc;
use tempfile::TempDir;

use gridsync_core::domain::FileEncoding;
use gridsync_core::SyncCore;

async fn setup_with_backups() -> (TempDir, Arc<MockRemoteClient>, SyncCore, uuid::Uuid) {
	let dir = TempDir::new().unwrap();
	let remote = Arc::new(MockRemoteClient::new());
	remote
		.set_tab("Sheet1", grid(&[&["A", "B"], &["C", "D"]]))
		.await;

	let core = test_core(dir.path(), Arc::clone(&remote)).await;
	let mut target = csv_target(dir.path());
	target.backup_policy.enabled = true;
	let target_id = core.add_target(target).await.unwrap();

	(dir, remote, core, target_id)
}

#[tokio::test]
async fn test_periodic_backup_only_when_remote_changed() {
	let (_dir, remote, core, target_id) = setup_with_backups().await;

	// First sync is a plain download; no periodic backup yet
	core.sync_now(target_id).await.unwrap();
	assert!(core.backups(target_id).await.unwrap().is_empty());

	// Remote change with a due policy produces exactly one backup
	remote.set_cell("Sheet1", 0, 0, "changed").await;
	core.sync_now(target_id).await.unwrap();
	let backups = core.backups(target_id).await.unwrap();
	assert_eq!(backups.len(), 1);
	assert_eq!(backups[0].target_id, target_id);
	assert!(backups[0].file_size_bytes > 0);

	// Another remote change inside the 24h interval: no second backup
	remote.set_cell("Sheet1", 0, 0, "changed again").await;
	core.sync_now(target_id).await.unwrap();
	assert_eq!(core.backups(target_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_no_backup_for_local_only_changes() {
	let (dir, remote, core, target_id) = setup_with_backups().await;
	core.sync_now(target_id).await.unwrap();

	write_csv(&dir.path().join("budget.csv"), &[&["A", "X"], &["C", "D"]]);
	core.sync_now(target_id).await.unwrap();

	assert_eq!(remote.cell("Sheet1", 0, 1).await, "X");
	assert!(core.backups(target_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_backup_overwrites_local_file() {
	let (dir, remote, core, target_id) = setup_with_backups().await;
	core.sync_now(target_id).await.unwrap();

	remote.set_cell("Sheet1", 0, 0, "v2").await;
	core.sync_now(target_id).await.unwrap();
	let backup = core.backups(target_id).await.unwrap()[0].clone();

	// Wreck the local file, then restore
	let local_path = dir.path().join("budget.csv");
	std::fs::write(&local_path, "garbage\n").unwrap();
	core.restore_backup(target_id, backup.id).await.unwrap();

	let rows = read_local(&local_path, FileEncoding::Csv).await;
	assert_eq!(rows[0][0], "v2");
}

#[tokio::test]
async fn test_restore_unknown_backup_fails() {
	let (_dir, _remote, core, target_id) = setup_with_backups().await;
	let result = core.restore_backup(target_id, uuid::Uuid::new_v4()).await;
	assert!(result.is_err());
}
