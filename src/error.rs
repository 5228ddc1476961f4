//! Sync engine error types

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::backup::BackupError;
use crate::codec::FileCodecError;
use crate::remote::{AuthError, RemoteError};
use crate::sync::detector::SnapshotStoreError;

/// Top-level sync operation errors
#[derive(Error, Debug)]
pub enum SyncError {
	/// Target is unknown to the engine
	#[error("Sync target not found: {0}")]
	TargetNotFound(Uuid),

	/// Target is disabled
	#[error("Sync target {0} is disabled")]
	TargetDisabled(Uuid),

	/// A sync for this target is already running
	#[error("Sync already in progress for target {0}")]
	AlreadySyncing(Uuid),

	/// Authentication failure
	#[error("Authentication error: {0}")]
	Auth(#[from] AuthError),

	/// Remote API failure
	#[error("Remote error: {0}")]
	Remote(#[from] RemoteError),

	/// Local file codec failure
	#[error("Local file error: {0}")]
	Codec(#[from] FileCodecError),

	/// Local file stayed locked through all writability retries
	#[error("Local file is locked: {0}")]
	FileLocked(PathBuf),

	/// Baseline snapshot persistence failure
	#[error("Snapshot store error: {0}")]
	SnapshotStore(#[from] SnapshotStoreError),

	/// Backup subsystem failure
	#[error("Backup error: {0}")]
	Backup(#[from] BackupError),

	/// Network request exceeded its overall deadline
	#[error("Network request timed out")]
	Timeout,

	/// IO error
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON error
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Configuration or service plumbing failure
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl SyncError {
	/// Whether the condition is expected to clear on its own and is worth a
	/// single delayed retry (network, rate limit, file lock). Everything else
	/// requires user intervention or the next regular timer tick.
	pub fn is_transient(&self) -> bool {
		match self {
			SyncError::Remote(RemoteError::Network(_)) => true,
			SyncError::Remote(RemoteError::RateLimited { .. }) => true,
			SyncError::Timeout => true,
			SyncError::FileLocked(_) => true,
			SyncError::Codec(FileCodecError::Locked(_)) => true,
			_ => false,
		}
	}

	/// Whether the error is a rate-limit signal, shown as its own status.
	pub fn is_rate_limited(&self) -> bool {
		matches!(self, SyncError::Remote(RemoteError::RateLimited { .. }))
	}
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
