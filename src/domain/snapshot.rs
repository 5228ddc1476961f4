//! Content-addressed grid snapshots
//!
//! A snapshot is immutable once constructed: per-cell hashes are computed
//! exactly once, in the constructor, and any content change produces a new
//! snapshot. Diffing compares hashes, never raw strings, so a sync cycle is
//! O(cells) regardless of value length.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Version prefix baked into cell hashes so the algorithm can be rotated
/// without old baselines comparing equal by accident.
pub const CELL_HASH_VERSION: u8 = 1;

/// Content hash of a single cell value.
pub fn hash_cell(value: &str) -> String {
	format!("v{}:{}", CELL_HASH_VERSION, blake3::hash(value.as_bytes()).to_hex())
}

/// Immutable snapshot of a single tab's grid.
///
/// Rows are ragged: a row is only as long as its last non-empty cell
/// requires. Comparisons pad conceptually to the union of both dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSnapshot {
	/// Tab name as reported by the remote sheet
	pub tab_name: String,

	/// Cell values, row-major, 0-based
	pub rows: Vec<Vec<String>>,

	/// Content hash per cell, same shape as `rows`
	pub per_cell_hash: Vec<Vec<String>>,

	/// When this snapshot was captured
	pub captured_at: DateTime<Utc>,
}

impl CellSnapshot {
	/// Build a snapshot from raw grid values, computing all cell hashes.
	pub fn new(tab_name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
		let per_cell_hash = rows
			.iter()
			.map(|row| row.iter().map(|v| hash_cell(v)).collect())
			.collect();

		Self {
			tab_name: tab_name.into(),
			rows,
			per_cell_hash,
			captured_at: Utc::now(),
		}
	}

	/// Cell value at (row, col); `None` when the address is out of bounds.
	pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
		self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
	}

	/// Cell value treating out-of-bounds and empty both as blank.
	pub fn cell_or_empty(&self, row: usize, col: usize) -> &str {
		self.cell(row, col).unwrap_or("")
	}

	/// Precomputed hash at (row, col), if the address is within bounds.
	pub fn hash_at(&self, row: usize, col: usize) -> Option<&str> {
		self.per_cell_hash
			.get(row)
			.and_then(|r| r.get(col))
			.map(String::as_str)
	}

	/// Number of rows in the grid.
	pub fn row_count(&self) -> usize {
		self.rows.len()
	}

	/// Width of the widest row.
	pub fn col_count(&self) -> usize {
		self.rows.iter().map(Vec::len).max().unwrap_or(0)
	}

	/// Number of non-empty cells.
	pub fn non_empty_cells(&self) -> usize {
		self.rows
			.iter()
			.map(|row| row.iter().filter(|v| !v.is_empty()).count())
			.sum()
	}
}

/// Immutable snapshot of an entire remote sheet.
///
/// `tab_order` preserves the remote's native tab ordering; the local file
/// must be reproduced in that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetSnapshot {
	/// Remote sheet identifier
	pub remote_sheet_id: String,

	/// Per-tab snapshots, keyed by tab name
	pub tabs: HashMap<String, CellSnapshot>,

	/// Tab names in the remote's native order
	pub tab_order: Vec<String>,

	/// When this snapshot was captured
	pub captured_at: DateTime<Utc>,
}

impl SheetSnapshot {
	/// Build a sheet snapshot from tabs in remote order.
	pub fn new(remote_sheet_id: impl Into<String>, tabs_in_order: Vec<CellSnapshot>) -> Self {
		let tab_order = tabs_in_order.iter().map(|t| t.tab_name.clone()).collect();
		let tabs = tabs_in_order
			.into_iter()
			.map(|t| (t.tab_name.clone(), t))
			.collect();

		Self {
			remote_sheet_id: remote_sheet_id.into(),
			tabs,
			tab_order,
			captured_at: Utc::now(),
		}
	}

	/// Tab snapshot by name.
	pub fn tab(&self, name: &str) -> Option<&CellSnapshot> {
		self.tabs.get(name)
	}

	/// Tabs in remote order.
	pub fn tabs_in_order(&self) -> impl Iterator<Item = &CellSnapshot> {
		self.tab_order.iter().filter_map(|name| self.tabs.get(name))
	}

	/// Total non-empty cells across all tabs.
	pub fn non_empty_cells(&self) -> usize {
		self.tabs.values().map(CellSnapshot::non_empty_cells).sum()
	}

	/// Largest row count across tabs.
	pub fn max_row_count(&self) -> usize {
		self.tabs.values().map(CellSnapshot::row_count).max().unwrap_or(0)
	}

	/// Largest column count across tabs.
	pub fn max_col_count(&self) -> usize {
		self.tabs.values().map(CellSnapshot::col_count).max().unwrap_or(0)
	}

	/// Copy this snapshot with one cell replaced. See [`Self::with_cells`].
	pub fn with_cell(&self, tab_name: &str, row: usize, col: usize, value: &str) -> Self {
		self.with_cells([(tab_name.to_string(), row, col, value.to_string())])
	}

	/// Copy this snapshot with a batch of cells replaced, auto-growing each
	/// touched tab's grid when an address exceeds current bounds. Used to
	/// build the merged snapshot during conflict resolution; the original
	/// stays untouched per the immutability rule, and each touched tab's
	/// hashes are recomputed exactly once.
	pub fn with_cells(
		&self,
		updates: impl IntoIterator<Item = (String, usize, usize, String)>,
	) -> Self {
		let mut next = self.clone();
		let mut touched: HashMap<String, Vec<Vec<String>>> = HashMap::new();

		for (tab_name, row, col, value) in updates {
			let rows = touched.entry(tab_name.clone()).or_insert_with(|| {
				next.tabs
					.get(&tab_name)
					.map(|t| t.rows.clone())
					.unwrap_or_default()
			});

			if rows.len() <= row {
				rows.resize(row + 1, Vec::new());
			}
			if rows[row].len() <= col {
				rows[row].resize(col + 1, String::new());
			}
			rows[row][col] = value;
		}

		for (tab_name, rows) in touched {
			if !next.tabs.contains_key(&tab_name) {
				next.tab_order.push(tab_name.clone());
			}
			next.tabs
				.insert(tab_name.clone(), CellSnapshot::new(tab_name, rows));
		}
		next
	}
}
