//! Backup metadata records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::target::FileEncoding;

/// Durable record describing one immutable backup file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
	/// Unique identifier
	pub id: Uuid,

	/// Target this backup belongs to
	pub target_id: Uuid,

	/// Remote sheet identifier at backup time
	pub remote_sheet_id: String,

	/// Remote sheet name at backup time
	pub remote_sheet_name: String,

	/// When the backup was taken
	pub backup_time: DateTime<Utc>,

	/// Encoding of the backup file
	pub file_encoding: FileEncoding,

	/// Size of the written file in bytes
	pub file_size_bytes: u64,

	/// Largest row count across tabs at backup time
	pub row_count: usize,

	/// Largest column count across tabs at backup time
	pub column_count: usize,

	/// Tab names included in the backup
	pub tab_names: Vec<String>,

	/// blake3 checksum of the written bytes, verified before any restore
	pub content_checksum: String,
}
