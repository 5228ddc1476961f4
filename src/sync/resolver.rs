//! Deterministic conflict resolution
//!
//! Winner rule: **remote always wins**. The rule is unconditional and never
//! inferred from modification timestamps — timestamps from two unrelated
//! clocks are not a safe tiebreaker. Every conflict is still recorded so the
//! caller can surface an audit trail; nothing is silently dropped.
//!
//! The other safety rule: deletions detected on the local side are never
//! uploaded. A cell that vanished from the local file is far more often a
//! truncated read, a partial write, or a crashed editor than an intentional
//! mass deletion, and the remote sheet is the source of truth worth
//! protecting.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{CellAddress, CellChange, ChangeType, SheetSnapshot};
use crate::remote::CellUpdate;

/// Name of the winner policy, used in audit events and notifications
pub const WINNER_RULE: &str = "remote-wins";

/// Which side won a conflicted cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictWinner {
	Remote,
	Local,
}

/// One cell changed on both sides since the baseline
#[derive(Debug, Clone)]
pub struct ConflictInfo {
	pub address: CellAddress,
	pub local_value: String,
	pub remote_value: String,
	pub timestamp: DateTime<Utc>,
	pub winner: ConflictWinner,
}

impl ConflictInfo {
	/// Render as an audit marker row for the local file codec.
	pub fn as_marker_row(&self) -> Vec<String> {
		vec![
			"# conflict".to_string(),
			self.address.to_string(),
			format!("local={}", self.local_value),
			format!("remote={}", self.remote_value),
			format!("winner={}", WINNER_RULE),
		]
	}
}

/// Outcome of resolving local against remote changes
#[derive(Debug)]
pub struct Resolution {
	/// Local changes cleared for upload to the remote
	pub changes_to_upload: Vec<CellUpdate>,

	/// Every conflicted address, regardless of winner
	pub conflicts: Vec<ConflictInfo>,

	/// Remote snapshot with winning local changes applied
	pub merged_snapshot: SheetSnapshot,

	/// Whether the local file must be rewritten to match `merged_snapshot`
	pub has_local_updates: bool,

	/// Local deletions filtered out by the no-deletion-upload rule
	pub suppressed_deletions: usize,
}

/// Resolves both-sided change sets into a merge decision
pub struct ConflictResolver;

impl ConflictResolver {
	/// Resolve local changes against remote changes, both diffed from the
	/// same baseline. The merged snapshot starts as a copy of the fetched
	/// remote snapshot; winning local values are applied on top.
	pub fn resolve(
		&self,
		local_changes: &[CellChange],
		remote_changes: &[CellChange],
		remote_snapshot: &SheetSnapshot,
	) -> Resolution {
		// Local deletions are suppressed before anything else
		let (deletions, candidates): (Vec<_>, Vec<_>) = local_changes
			.iter()
			.partition(|c| c.change_type == ChangeType::Deleted);
		let suppressed_deletions = deletions.len();
		if suppressed_deletions > 0 {
			info!(
				"Suppressed {} local deletion(s); deletions are never uploaded",
				suppressed_deletions
			);
		}

		let remote_by_address: HashMap<CellAddress, &CellChange> = remote_changes
			.iter()
			.map(|c| (c.address(), c))
			.collect();

		let mut changes_to_upload = Vec::new();
		let mut conflicts = Vec::new();

		for change in candidates {
			let address = change.address();
			let local_value = change.new_value.clone().unwrap_or_default();

			if remote_by_address.contains_key(&address) {
				let remote_value = remote_snapshot
					.tab(&address.tab_name)
					.map(|tab| tab.cell_or_empty(address.row, address.column))
					.unwrap_or("")
					.to_string();

				debug!(
					"Conflict at {}: local={:?} remote={:?}, remote wins",
					address, local_value, remote_value
				);
				conflicts.push(ConflictInfo {
					address,
					local_value,
					remote_value,
					timestamp: Utc::now(),
					winner: ConflictWinner::Remote,
				});
			} else {
				changes_to_upload.push(CellUpdate {
					tab_name: change.tab_name.clone(),
					row: change.row,
					col: change.column,
					value: local_value,
				});
			}
		}

		let merged_snapshot = remote_snapshot.with_cells(
			changes_to_upload
				.iter()
				.map(|u| (u.tab_name.clone(), u.row, u.col, u.value.clone())),
		);

		// The local file needs a rewrite whenever the remote moved since
		// baseline, or a suppressed deletion left the file behind the merged
		// state
		let has_local_updates = !remote_changes.is_empty() || suppressed_deletions > 0;

		Resolution {
			changes_to_upload,
			conflicts,
			merged_snapshot,
			has_local_updates,
			suppressed_deletions,
		}
	}
}
