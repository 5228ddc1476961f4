//! Sync target configuration and runtime status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use uuid::Uuid;

/// Minimum allowed sync interval; shorter configured values are clamped up.
pub const MIN_SYNC_INTERVAL_SECS: u64 = 30;

/// Encoding of the local file side of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEncoding {
	/// Multi-tab xlsx workbook
	Workbook,
	/// Single-tab CSV
	Csv,
	/// Multi-tab JSON document
	Json,
}

impl FileEncoding {
	/// Canonical file extension for the encoding.
	pub fn extension(&self) -> &'static str {
		match self {
			FileEncoding::Workbook => "xlsx",
			FileEncoding::Csv => "csv",
			FileEncoding::Json => "json",
		}
	}
}

/// Time-based backup policy for a target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupPolicy {
	/// Whether periodic backups are taken at all
	pub enabled: bool,

	/// Minimum hours between periodic backups
	pub interval_hours: u32,

	/// When the last periodic backup was taken
	pub last_backup_at: Option<DateTime<Utc>>,
}

impl Default for BackupPolicy {
	fn default() -> Self {
		Self {
			enabled: true,
			interval_hours: 24,
			last_backup_at: None,
		}
	}
}

impl BackupPolicy {
	/// Whether a periodic backup is due at `now`.
	pub fn is_due(&self, now: DateTime<Utc>) -> bool {
		if !self.enabled {
			return false;
		}
		match self.last_backup_at {
			None => true,
			Some(last) => now - last >= chrono::Duration::hours(self.interval_hours as i64),
		}
	}
}

/// One configured pairing of a remote sheet with a local file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTarget {
	/// Stable identity
	pub id: Uuid,

	/// Remote sheet identifier
	pub remote_sheet_id: String,

	/// Human-readable remote sheet name
	pub remote_sheet_name: String,

	/// Tabs to sync; empty means all tabs
	pub selected_tabs: HashSet<String>,

	/// Whether tabs created remotely after setup are picked up automatically
	pub sync_new_tabs: bool,

	/// Path of the local file
	pub local_path: PathBuf,

	/// Encoding of the local file
	pub file_encoding: FileEncoding,

	/// Seconds between periodic syncs (clamped to `MIN_SYNC_INTERVAL_SECS`)
	pub sync_interval_secs: u64,

	/// Whether the target participates in syncing at all
	pub enabled: bool,

	/// Backup policy
	pub backup_policy: BackupPolicy,
}

impl SyncTarget {
	pub fn new(
		remote_sheet_id: impl Into<String>,
		remote_sheet_name: impl Into<String>,
		local_path: PathBuf,
		file_encoding: FileEncoding,
	) -> Self {
		Self {
			id: Uuid::new_v4(),
			remote_sheet_id: remote_sheet_id.into(),
			remote_sheet_name: remote_sheet_name.into(),
			selected_tabs: HashSet::new(),
			sync_new_tabs: true,
			local_path,
			file_encoding,
			sync_interval_secs: 300,
			enabled: true,
			backup_policy: BackupPolicy::default(),
		}
	}

	/// Effective sync interval, with the floor clamp applied.
	pub fn effective_interval_secs(&self) -> u64 {
		self.sync_interval_secs.max(MIN_SYNC_INTERVAL_SECS)
	}

	/// Whether a tab participates in this target's sync.
	pub fn includes_tab(&self, tab_name: &str) -> bool {
		self.selected_tabs.is_empty() || self.selected_tabs.contains(tab_name)
	}
}

/// Current status of a target's sync state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
	Idle,
	Syncing,
	Error,
	RateLimited,
	/// First-sync destination confirmation was declined
	Paused,
}

/// Runtime state the engine keeps per target
#[derive(Debug, Clone)]
pub struct TargetState {
	pub status: SyncStatus,
	pub last_sync: Option<DateTime<Utc>>,
	pub next_sync: Option<DateTime<Utc>>,
	pub last_error: Option<String>,
}

impl Default for TargetState {
	fn default() -> Self {
		Self {
			status: SyncStatus::Idle,
			last_sync: None,
			next_sync: None,
			last_error: None,
		}
	}
}

impl TargetState {
	/// Human-relative "last synced" readout, e.g. "3m ago".
	pub fn last_sync_relative(&self, now: DateTime<Utc>) -> String {
		match self.last_sync {
			None => "never".to_string(),
			Some(at) => format_relative(now - at),
		}
	}

	/// Human-relative "next sync" readout, e.g. "in 2m".
	pub fn next_sync_relative(&self, now: DateTime<Utc>) -> String {
		match self.next_sync {
			None => "not scheduled".to_string(),
			Some(at) if at <= now => "due now".to_string(),
			Some(at) => format!("in {}", format_duration(at - now)),
		}
	}
}

fn format_relative(elapsed: chrono::Duration) -> String {
	format!("{} ago", format_duration(elapsed))
}

fn format_duration(d: chrono::Duration) -> String {
	let secs = d.num_seconds().max(0);
	if secs < 60 {
		format!("{}s", secs)
	} else if secs < 3600 {
		format!("{}m", secs / 60)
	} else if secs < 86_400 {
		format!("{}h", secs / 3600)
	} else {
		format!("{}d", secs / 86_400)
	}
}
