//! Shared test doubles: an in-memory remote sheet service and a
//! controllable auth provider.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use gridsync_core::codec::{DefaultFileGateway, LocalFileGateway};
use gridsync_core::domain::{FileEncoding, SyncTarget};
use gridsync_core::remote::{
	AuthError, AuthProvider, CellUpdate, RemoteClient, RemoteError, SheetMetadata, TabMetadata,
};
use gridsync_core::sync::FirstSyncConfirmer;
use gridsync_core::SyncCore;

pub const SHEET_ID: &str = "sheet-test-1";

/// Error behavior injected into every remote call while set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
	Network,
	RateLimited,
}

/// In-memory stand-in for the remote sheet service
pub struct MockRemoteClient {
	tabs: Mutex<Vec<(String, Vec<Vec<String>>)>>,
	row_bounds: Mutex<HashMap<String, usize>>,
	pushed: Mutex<Vec<CellUpdate>>,
	fail_mode: Mutex<Option<FailMode>>,
	response_delay: Mutex<Option<Duration>>,
}

impl MockRemoteClient {
	pub fn new() -> Self {
		Self {
			tabs: Mutex::new(Vec::new()),
			row_bounds: Mutex::new(HashMap::new()),
			pushed: Mutex::new(Vec::new()),
			fail_mode: Mutex::new(None),
			response_delay: Mutex::new(None),
		}
	}

	/// Insert or replace a tab, preserving insertion order.
	pub async fn set_tab(&self, name: &str, rows: Vec<Vec<String>>) {
		let mut tabs = self.tabs.lock().await;
		if let Some(entry) = tabs.iter_mut().find(|(n, _)| n == name) {
			entry.1 = rows;
		} else {
			tabs.push((name.to_string(), rows));
		}
	}

	pub async fn set_cell(&self, tab: &str, row: usize, col: usize, value: &str) {
		let mut tabs = self.tabs.lock().await;
		let entry = tabs
			.iter_mut()
			.find(|(n, _)| n == tab)
			.expect("unknown tab in mock");
		grow_and_set(&mut entry.1, row, col, value.to_string());
	}

	pub async fn cell(&self, tab: &str, row: usize, col: usize) -> String {
		let tabs = self.tabs.lock().await;
		tabs.iter()
			.find(|(n, _)| n == tab)
			.and_then(|(_, rows)| rows.get(row))
			.and_then(|r| r.get(col))
			.cloned()
			.unwrap_or_default()
	}

	/// Override the row bound reported in metadata for a tab.
	pub async fn set_row_bound(&self, tab: &str, bound: usize) {
		self.row_bounds.lock().await.insert(tab.to_string(), bound);
	}

	pub async fn set_fail_mode(&self, mode: Option<FailMode>) {
		*self.fail_mode.lock().await = mode;
	}

	pub async fn set_response_delay(&self, delay: Option<Duration>) {
		*self.response_delay.lock().await = delay;
	}

	pub async fn pushed_updates(&self) -> Vec<CellUpdate> {
		self.pushed.lock().await.clone()
	}

	async fn gate(&self) -> Result<(), RemoteError> {
		let delay = *self.response_delay.lock().await;
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		match *self.fail_mode.lock().await {
			Some(FailMode::Network) => Err(RemoteError::Network("connection refused".into())),
			Some(FailMode::RateLimited) => Err(RemoteError::RateLimited { retry_after: None }),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl RemoteClient for MockRemoteClient {
	async fn fetch_sheet_metadata(&self, _sheet_id: &str) -> Result<SheetMetadata, RemoteError> {
		self.gate().await?;
		let bounds = self.row_bounds.lock().await.clone();
		let tabs = self
			.tabs
			.lock()
			.await
			.iter()
			.map(|(name, rows)| TabMetadata {
				name: name.clone(),
				row_count: bounds.get(name).copied().unwrap_or(rows.len()),
				col_count: rows.iter().map(Vec::len).max().unwrap_or(0),
			})
			.collect();
		Ok(SheetMetadata { tabs })
	}

	async fn fetch_tab_values(
		&self,
		_sheet_id: &str,
		tab_name: &str,
	) -> Result<Vec<Vec<String>>, RemoteError> {
		self.gate().await?;
		self.tabs
			.lock()
			.await
			.iter()
			.find(|(n, _)| n == tab_name)
			.map(|(_, rows)| rows.clone())
			.ok_or_else(|| RemoteError::NotFound(tab_name.to_string()))
	}

	async fn push_cell_updates(
		&self,
		_sheet_id: &str,
		updates: &[CellUpdate],
	) -> Result<usize, RemoteError> {
		self.gate().await?;
		self.pushed.lock().await.extend(updates.iter().cloned());

		let mut tabs = self.tabs.lock().await;
		for update in updates {
			let entry = tabs
				.iter_mut()
				.find(|(n, _)| n == &update.tab_name)
				.ok_or_else(|| RemoteError::NotFound(update.tab_name.clone()))?;
			grow_and_set(&mut entry.1, update.row, update.col, update.value.clone());
		}
		Ok(updates.len())
	}

	async fn fetch_last_modified(&self, _sheet_id: &str) -> Result<DateTime<Utc>, RemoteError> {
		self.gate().await?;
		Ok(Utc::now())
	}
}

fn grow_and_set(rows: &mut Vec<Vec<String>>, row: usize, col: usize, value: String) {
	if rows.len() <= row {
		rows.resize(row + 1, Vec::new());
	}
	if rows[row].len() <= col {
		rows[row].resize(col + 1, String::new());
	}
	rows[row][col] = value;
}

/// Auth provider that can be flipped into a failing state
pub struct MockAuthProvider {
	pub fail: AtomicBool,
}

impl MockAuthProvider {
	pub fn new() -> Self {
		Self {
			fail: AtomicBool::new(false),
		}
	}
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
	async fn get_valid_token(&self) -> Result<String, AuthError> {
		if self.fail.load(Ordering::SeqCst) {
			Err(AuthError::NotAuthenticated)
		} else {
			Ok("test-token".to_string())
		}
	}
}

/// First-sync confirmer that always declines
pub struct DenyOverwrite;

#[async_trait]
impl FirstSyncConfirmer for DenyOverwrite {
	async fn confirm_overwrite(&self, _target: &SyncTarget) -> bool {
		false
	}
}

pub fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
	rows.iter()
		.map(|r| r.iter().map(|c| c.to_string()).collect())
		.collect()
}

/// Write a CSV file from raw rows. Test values never contain commas.
pub fn write_csv(path: &Path, rows: &[&[&str]]) {
	let text: String = rows
		.iter()
		.map(|r| r.join(","))
		.collect::<Vec<_>>()
		.join("\n");
	std::fs::write(path, text + "\n").unwrap();
}

/// Read a local file back through the production gateway; returns the rows
/// of its first tab.
pub async fn read_local(path: &Path, encoding: FileEncoding) -> Vec<Vec<String>> {
	let snapshot = DefaultFileGateway
		.read(path, encoding)
		.await
		.expect("local file should read back");
	let first = snapshot.tab_order.first().expect("file has no tabs").clone();
	snapshot.tab(&first).unwrap().rows.clone()
}

/// A CSV target whose local file lives next to the data directory.
pub fn csv_target(dir: &Path) -> SyncTarget {
	let mut target = SyncTarget::new(
		SHEET_ID,
		"Test Sheet",
		dir.join("budget.csv"),
		FileEncoding::Csv,
	);
	// Keep periodic backups out of scenario tests unless they opt in
	target.backup_policy.enabled = false;
	target
}

/// Spin up a full core in `dir` against the given mock remote.
pub async fn test_core(dir: &Path, remote: Arc<MockRemoteClient>) -> SyncCore {
	SyncCore::new(
		data_dir(dir),
		Arc::new(MockAuthProvider::new()),
		remote,
	)
	.await
	.expect("core should start")
}

pub fn data_dir(dir: &Path) -> PathBuf {
	dir.join("data")
}
