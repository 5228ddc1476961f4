//! Cell-level change detection against the persisted baseline
//!
//! Diffing walks the union of the (tab, row, col) index space of the two
//! snapshots and compares precomputed content hashes, so cost is O(cells)
//! regardless of how large individual values are.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{hash_cell, CellChange, CellSnapshot, ChangeSource, SheetSnapshot};

/// Baseline snapshot persistence failures
#[derive(Error, Debug)]
pub enum SnapshotStoreError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Durable per-target baseline snapshots: the three-way-merge ancestors.
///
/// Writes go to a temp file and are renamed into place, so a crash mid-write
/// leaves the previous baseline intact and the interrupted sync's delta is
/// simply reprocessed on the next attempt.
pub struct SnapshotStore {
	dir: PathBuf,
	cache: RwLock<HashMap<Uuid, SheetSnapshot>>,
}

impl SnapshotStore {
	pub fn new(dir: PathBuf) -> Self {
		Self {
			dir,
			cache: RwLock::new(HashMap::new()),
		}
	}

	fn path_for(&self, target_id: Uuid) -> PathBuf {
		self.dir.join(format!("{}.json", target_id))
	}

	/// Persist a baseline, durably, before returning.
	pub async fn save(
		&self,
		target_id: Uuid,
		snapshot: &SheetSnapshot,
	) -> Result<(), SnapshotStoreError> {
		std::fs::create_dir_all(&self.dir)?;

		let path = self.path_for(target_id);
		let tmp = path.with_extension("json.tmp");
		let json = serde_json::to_string(snapshot)?;
		std::fs::write(&tmp, json)?;
		std::fs::rename(&tmp, &path)?;

		self.cache.write().await.insert(target_id, snapshot.clone());
		debug!("Saved baseline for target {}", target_id);
		Ok(())
	}

	/// Load a baseline; `None` means the target has never completed a sync.
	pub async fn get(&self, target_id: Uuid) -> Result<Option<SheetSnapshot>, SnapshotStoreError> {
		if let Some(snapshot) = self.cache.read().await.get(&target_id) {
			return Ok(Some(snapshot.clone()));
		}

		let path = self.path_for(target_id);
		if !path.exists() {
			return Ok(None);
		}

		let json = std::fs::read_to_string(&path)?;
		let snapshot: SheetSnapshot = serde_json::from_str(&json)?;
		self.cache.write().await.insert(target_id, snapshot.clone());
		Ok(Some(snapshot))
	}

	/// Remove a target's baseline (target deletion).
	pub async fn delete(&self, target_id: Uuid) -> Result<(), SnapshotStoreError> {
		self.cache.write().await.remove(&target_id);

		let path = self.path_for(target_id);
		if path.exists() {
			std::fs::remove_file(&path)?;
		}
		debug!("Deleted baseline for target {}", target_id);
		Ok(())
	}
}

/// Detects cell changes between a current snapshot and the baseline
pub struct ChangeDetector {
	store: SnapshotStore,
}

impl ChangeDetector {
	pub fn new(baselines_dir: PathBuf) -> Self {
		Self {
			store: SnapshotStore::new(baselines_dir),
		}
	}

	/// Diff `current` against `baseline`. With no baseline (bootstrap),
	/// every non-empty cell of `current` is an addition — the whole sheet is
	/// new.
	pub fn detect_changes(
		&self,
		current: &SheetSnapshot,
		baseline: Option<&SheetSnapshot>,
		source: ChangeSource,
	) -> Vec<CellChange> {
		let Some(baseline) = baseline else {
			return current
				.tabs_in_order()
				.flat_map(|tab| Self::all_non_empty(tab, source, false))
				.collect();
		};

		let mut changes = Vec::new();

		// Union of tab names, current's order first for stable output
		let mut tab_names: Vec<&str> = current.tab_order.iter().map(String::as_str).collect();
		let seen: BTreeSet<&str> = tab_names.iter().copied().collect();
		tab_names.extend(
			baseline
				.tab_order
				.iter()
				.map(String::as_str)
				.filter(|name| !seen.contains(name)),
		);

		for tab_name in tab_names {
			match (current.tab(tab_name), baseline.tab(tab_name)) {
				(Some(cur), Some(base)) => {
					Self::diff_tab(cur, base, source, &mut changes);
				}
				(Some(cur), None) => {
					changes.extend(Self::all_non_empty(cur, source, false));
				}
				(None, Some(base)) => {
					changes.extend(Self::all_non_empty(base, source, true));
				}
				(None, None) => unreachable!("tab name came from one of the snapshots"),
			}
		}

		changes
	}

	/// Diff one tab cell-by-cell over the union of both dimensions.
	fn diff_tab(
		current: &CellSnapshot,
		baseline: &CellSnapshot,
		source: ChangeSource,
		changes: &mut Vec<CellChange>,
	) {
		let empty_hash = hash_cell("");
		let rows = current.row_count().max(baseline.row_count());
		let cols = current.col_count().max(baseline.col_count());

		for row in 0..rows {
			for col in 0..cols {
				// Absent cells hash like empty ones
				let old_hash = baseline.hash_at(row, col).unwrap_or(&empty_hash);
				let new_hash = current.hash_at(row, col).unwrap_or(&empty_hash);
				if old_hash == new_hash {
					continue;
				}

				if let Some(change) = CellChange::derive(
					&current.tab_name,
					row,
					col,
					baseline.cell_or_empty(row, col),
					current.cell_or_empty(row, col),
					source,
				) {
					changes.push(change);
				}
			}
		}
	}

	/// Every non-empty cell of a tab as added (or deleted) changes.
	fn all_non_empty(tab: &CellSnapshot, source: ChangeSource, deleted: bool) -> Vec<CellChange> {
		let mut changes = Vec::new();
		for (row, cells) in tab.rows.iter().enumerate() {
			for (col, value) in cells.iter().enumerate() {
				if value.is_empty() {
					continue;
				}
				let (old_value, new_value) = if deleted { (value.as_str(), "") } else { ("", value.as_str()) };
				if let Some(change) =
					CellChange::derive(&tab.tab_name, row, col, old_value, new_value, source)
				{
					changes.push(change);
				}
			}
		}
		changes
	}

	/// Persist the baseline for a target (durable before returning).
	pub async fn save_snapshot(
		&self,
		target_id: Uuid,
		snapshot: &SheetSnapshot,
	) -> Result<(), SnapshotStoreError> {
		self.store.save(target_id, snapshot).await
	}

	/// Load the baseline for a target.
	pub async fn get_snapshot(
		&self,
		target_id: Uuid,
	) -> Result<Option<SheetSnapshot>, SnapshotStoreError> {
		self.store.get(target_id).await
	}

	/// Delete the baseline for a target.
	pub async fn delete_snapshot(&self, target_id: Uuid) -> Result<(), SnapshotStoreError> {
		self.store.delete(target_id).await
	}
}
