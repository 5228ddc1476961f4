//! Cell-level change records produced by diffing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the sync a change was detected on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
	Local,
	Remote,
}

/// Kind of cell change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
	Added,
	Modified,
	Deleted,
}

/// Address of a single cell within a sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddress {
	pub tab_name: String,
	pub row: usize,
	pub column: usize,
}

impl std::fmt::Display for CellAddress {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}!R{}C{}", self.tab_name, self.row + 1, self.column + 1)
	}
}

/// A single detected cell change relative to the baseline snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellChange {
	/// Unique identifier
	pub id: Uuid,

	/// Tab the cell lives in
	pub tab_name: String,

	/// 0-based row index
	pub row: usize,

	/// 0-based column index
	pub column: usize,

	/// Value before the change; `None` when the cell was absent
	pub old_value: Option<String>,

	/// Value after the change; `None` when the cell was removed
	pub new_value: Option<String>,

	/// Derived change kind
	pub change_type: ChangeType,

	/// When the change was detected
	pub detected_at: DateTime<Utc>,

	/// Which side the change was observed on
	pub source: ChangeSource,
}

impl CellChange {
	/// Derive a change from old/new values at an address. Returns `None`
	/// when the values are equal (including both blank) — equal values are
	/// never a change.
	pub fn derive(
		tab_name: &str,
		row: usize,
		column: usize,
		old_value: &str,
		new_value: &str,
		source: ChangeSource,
	) -> Option<Self> {
		if old_value == new_value {
			return None;
		}

		let change_type = match (old_value.is_empty(), new_value.is_empty()) {
			(true, false) => ChangeType::Added,
			(false, true) => ChangeType::Deleted,
			(false, false) => ChangeType::Modified,
			// Both empty means equal, handled above
			(true, true) => return None,
		};

		Some(Self {
			id: Uuid::new_v4(),
			tab_name: tab_name.to_string(),
			row,
			column,
			old_value: (!old_value.is_empty()).then(|| old_value.to_string()),
			new_value: (!new_value.is_empty()).then(|| new_value.to_string()),
			change_type,
			detected_at: Utc::now(),
			source,
		})
	}

	/// Address of the changed cell.
	pub fn address(&self) -> CellAddress {
		CellAddress {
			tab_name: self.tab_name.clone(),
			row: self.row,
			column: self.column,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_derive_added() {
		let change = CellChange::derive("S", 0, 0, "", "X", ChangeSource::Local).unwrap();
		assert_eq!(change.change_type, ChangeType::Added);
		assert_eq!(change.old_value, None);
		assert_eq!(change.new_value.as_deref(), Some("X"));
	}

	#[test]
	fn test_derive_deleted() {
		let change = CellChange::derive("S", 1, 2, "X", "", ChangeSource::Remote).unwrap();
		assert_eq!(change.change_type, ChangeType::Deleted);
		assert_eq!(change.new_value, None);
	}

	#[test]
	fn test_derive_modified() {
		let change = CellChange::derive("S", 0, 0, "X", "Y", ChangeSource::Local).unwrap();
		assert_eq!(change.change_type, ChangeType::Modified);
	}

	#[test]
	fn test_equal_values_are_not_a_change() {
		assert!(CellChange::derive("S", 0, 0, "X", "X", ChangeSource::Local).is_none());
		assert!(CellChange::derive("S", 0, 0, "", "", ChangeSource::Local).is_none());
	}

	#[test]
	fn test_address_display() {
		let change = CellChange::derive("Data", 0, 1, "", "X", ChangeSource::Local).unwrap();
		assert_eq!(change.address().to_string(), "Data!R1C2");
	}
}
