//! Timestamped, checksummed backups with a global storage budget
//!
//! Backups are immutable once written. The durable index is the source of
//! truth: a new backup file is written before it is indexed, and a deletion
//! is indexed before its file goes away, so a crash can only leave orphan
//! files, never dangling index entries. The in-memory cache is replaced only
//! after the index file has been persisted, and index access is serialized
//! behind a mutex so concurrent targets never interleave read-modify-write
//! cycles.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{FileCodecError, LocalFileGateway};
use crate::domain::{BackupMetadata, SheetSnapshot, SyncTarget};
use crate::infrastructure::{Event, EventBus};

/// Backup subsystem failures, all distinguishable so callers can report
/// exactly what went wrong — but never fatal to the sync that triggered them
#[derive(Error, Debug)]
pub enum BackupError {
	/// The codec failed to write the backup file
	#[error("Backup write failed for {path}: {source}")]
	WriteFailed {
		path: PathBuf,
		#[source]
		source: FileCodecError,
	},

	/// The written backup file came out empty
	#[error("Backup file is empty: {0}")]
	EmptyBackup(PathBuf),

	/// File attributes could not be read after writing
	#[error("Could not read backup attributes for {path}: {source}")]
	Attributes {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Stored checksum does not match current file content
	#[error("Backup checksum mismatch for {path}")]
	ChecksumMismatch { path: PathBuf },

	/// No backup with this id exists in the index
	#[error("Backup not found: {0}")]
	NotFound(Uuid),

	/// Durable index read/write failure
	#[error("Backup index error: {0}")]
	Index(#[from] std::io::Error),

	/// Index (de)serialization failure
	#[error("Backup index JSON error: {0}")]
	IndexJson(#[from] serde_json::Error),
}

type BackupIndex = HashMap<Uuid, Vec<BackupMetadata>>;

pub struct BackupManager {
	backups_dir: PathBuf,
	index_path: PathBuf,
	budget_bytes: u64,
	gateway: Arc<dyn LocalFileGateway>,
	events: Arc<EventBus>,
	/// Serializes every index read-modify-write across targets
	index: Mutex<Option<BackupIndex>>,
}

impl BackupManager {
	pub fn new(
		backups_dir: PathBuf,
		index_path: PathBuf,
		budget_bytes: u64,
		gateway: Arc<dyn LocalFileGateway>,
		events: Arc<EventBus>,
	) -> Self {
		Self {
			backups_dir,
			index_path,
			budget_bytes,
			gateway,
			events,
			index: Mutex::new(None),
		}
	}

	/// Write a backup of `snapshot` for `target`, record it in the index,
	/// and prune if the global budget is exceeded.
	pub async fn create_backup(
		&self,
		target: &SyncTarget,
		snapshot: &SheetSnapshot,
	) -> Result<BackupMetadata, BackupError> {
		let backup_id = Uuid::new_v4();
		let backup_time = Utc::now();
		let path = self.backup_file_path(target, backup_time, backup_id);

		self.gateway
			.write(snapshot, &path, target.file_encoding, &[])
			.await
			.map_err(|source| BackupError::WriteFailed {
				path: path.clone(),
				source,
			})?;

		let bytes = std::fs::read(&path).map_err(|source| BackupError::Attributes {
			path: path.clone(),
			source,
		})?;
		if bytes.is_empty() {
			return Err(BackupError::EmptyBackup(path));
		}

		let metadata = BackupMetadata {
			id: backup_id,
			target_id: target.id,
			remote_sheet_id: target.remote_sheet_id.clone(),
			remote_sheet_name: target.remote_sheet_name.clone(),
			backup_time,
			file_encoding: target.file_encoding,
			file_size_bytes: bytes.len() as u64,
			row_count: snapshot.max_row_count(),
			column_count: snapshot.max_col_count(),
			tab_names: snapshot.tab_order.clone(),
			content_checksum: blake3::hash(&bytes).to_hex().to_string(),
		};

		{
			let mut guard = self.index.lock().await;
			self.commit(&mut guard, |index| {
				index.entry(target.id).or_default().push(metadata.clone());
				Ok(())
			})?;
		}

		info!(
			"Created backup {} for target {} ({} bytes)",
			metadata.id, target.id, metadata.file_size_bytes
		);
		self.events.emit(Event::BackupCreated {
			target_id: target.id,
			backup_id: metadata.id,
			file_size_bytes: metadata.file_size_bytes,
		});

		self.prune_if_needed().await?;
		Ok(metadata)
	}

	/// Delete globally-oldest backups, one at a time, until total bytes fit
	/// the budget or nothing remains.
	pub async fn prune_if_needed(&self) -> Result<(), BackupError> {
		let mut guard = self.index.lock().await;

		let mut deleted = 0usize;
		let mut freed = 0u64;

		loop {
			// Globally oldest, irrespective of target
			let oldest = {
				let index = self.load_index(&mut guard)?;
				let total: u64 = index
					.values()
					.flatten()
					.map(|m| m.file_size_bytes)
					.sum();
				if total <= self.budget_bytes {
					break;
				}
				index
					.values()
					.flatten()
					.min_by_key(|m| m.backup_time)
					.map(|m| (m.target_id, m.id))
			};
			let Some((target_id, backup_id)) = oldest else {
				break;
			};

			let removed = self.commit(&mut guard, |index| {
				Self::remove_from_index(index, target_id, backup_id)
					.ok_or(BackupError::NotFound(backup_id))
			})?;
			self.remove_backup_file(&removed);

			deleted += 1;
			freed += removed.file_size_bytes;
			debug!("Pruned backup {} ({} bytes)", backup_id, removed.file_size_bytes);
		}

		if deleted > 0 {
			info!("Pruned {} backup(s), freed {} bytes", deleted, freed);
			self.events.emit(Event::BackupsPruned {
				deleted,
				freed_bytes: freed,
			});
		}
		Ok(())
	}

	/// Restore a backup to `destination` after verifying its checksum
	/// against the current file content.
	pub async fn restore_backup(
		&self,
		metadata: &BackupMetadata,
		destination: &Path,
	) -> Result<(), BackupError> {
		let path = self.metadata_file_path(metadata);
		let bytes = std::fs::read(&path).map_err(|source| BackupError::Attributes {
			path: path.clone(),
			source,
		})?;

		let checksum = blake3::hash(&bytes).to_hex().to_string();
		if checksum != metadata.content_checksum {
			return Err(BackupError::ChecksumMismatch { path });
		}

		std::fs::copy(&path, destination)?;
		info!("Restored backup {} to {:?}", metadata.id, destination);
		Ok(())
	}

	/// Delete one backup: the index entry goes first (the durability
	/// boundary), then the file. A failed file removal leaves an orphan
	/// file, never a dangling index entry.
	pub async fn delete_backup(&self, backup_id: Uuid) -> Result<(), BackupError> {
		let mut guard = self.index.lock().await;

		let target_id = {
			let index = self.load_index(&mut guard)?;
			index
				.iter()
				.find(|(_, backups)| backups.iter().any(|m| m.id == backup_id))
				.map(|(target_id, _)| *target_id)
				.ok_or(BackupError::NotFound(backup_id))?
		};

		let removed = self.commit(&mut guard, |index| {
			Self::remove_from_index(index, target_id, backup_id)
				.ok_or(BackupError::NotFound(backup_id))
		})?;
		self.remove_backup_file(&removed);
		Ok(())
	}

	/// Delete every backup of a target and its index entries.
	pub async fn delete_all_backups_for_target(&self, target_id: Uuid) -> Result<(), BackupError> {
		let mut guard = self.index.lock().await;

		let removed = self.commit(&mut guard, |index| Ok(index.remove(&target_id)))?;
		if let Some(backups) = removed {
			for metadata in &backups {
				self.remove_backup_file(metadata);
			}
			info!(
				"Deleted {} backup(s) for target {}",
				backups.len(),
				target_id
			);
		}
		let target_dir = self.backups_dir.join(target_id.to_string());
		if target_dir.exists() {
			let _ = std::fs::remove_dir(&target_dir);
		}
		Ok(())
	}

	/// All backups of a target, newest first.
	pub async fn backups_for_target(
		&self,
		target_id: Uuid,
	) -> Result<Vec<BackupMetadata>, BackupError> {
		let mut guard = self.index.lock().await;
		let index = self.load_index(&mut guard)?;
		let mut backups = index.get(&target_id).cloned().unwrap_or_default();
		backups.sort_by(|a, b| b.backup_time.cmp(&a.backup_time));
		Ok(backups)
	}

	/// Backup file path: per-target directory, sheet name plus timestamp plus
	/// backup id. The id keeps two backups taken within the same second (a
	/// pre-merge backup and a periodic one in one cycle) from colliding.
	fn backup_file_path(
		&self,
		target: &SyncTarget,
		backup_time: DateTime<Utc>,
		backup_id: Uuid,
	) -> PathBuf {
		let name = format!(
			"{}_{}_{}.{}",
			sanitize_file_name(&target.remote_sheet_name),
			backup_time.format("%Y%m%d_%H%M%S"),
			backup_id.simple(),
			target.file_encoding.extension()
		);
		self.backups_dir.join(target.id.to_string()).join(name)
	}

	fn metadata_file_path(&self, metadata: &BackupMetadata) -> PathBuf {
		let name = format!(
			"{}_{}_{}.{}",
			sanitize_file_name(&metadata.remote_sheet_name),
			metadata.backup_time.format("%Y%m%d_%H%M%S"),
			metadata.id.simple(),
			metadata.file_encoding.extension()
		);
		self.backups_dir
			.join(metadata.target_id.to_string())
			.join(name)
	}

	/// Best-effort file removal once the index already forgot the backup.
	fn remove_backup_file(&self, metadata: &BackupMetadata) {
		let path = self.metadata_file_path(metadata);
		if let Err(e) = std::fs::remove_file(&path) {
			if e.kind() != std::io::ErrorKind::NotFound {
				warn!("Failed to delete backup file {:?}: {}", path, e);
			}
		}
	}

	fn remove_from_index(
		index: &mut BackupIndex,
		target_id: Uuid,
		backup_id: Uuid,
	) -> Option<BackupMetadata> {
		let backups = index.get_mut(&target_id)?;
		let position = backups.iter().position(|m| m.id == backup_id)?;
		let removed = backups.remove(position);
		if backups.is_empty() {
			index.remove(&target_id);
		}
		Some(removed)
	}

	/// Apply `mutate` to a working copy of the index, persist the copy, and
	/// only then replace the cache. A failed persist leaves the cache and the
	/// index file agreeing on the previous state.
	fn commit<T>(
		&self,
		guard: &mut Option<BackupIndex>,
		mutate: impl FnOnce(&mut BackupIndex) -> Result<T, BackupError>,
	) -> Result<T, BackupError> {
		let mut next = self.load_index(guard)?.clone();
		let value = mutate(&mut next)?;
		self.persist_index(&next)?;
		*guard = Some(next);
		Ok(value)
	}

	/// Lazily load the index into the guarded slot.
	fn load_index<'a>(
		&self,
		guard: &'a mut Option<BackupIndex>,
	) -> Result<&'a mut BackupIndex, BackupError> {
		if guard.is_none() {
			let index = if self.index_path.exists() {
				let json = std::fs::read_to_string(&self.index_path)?;
				serde_json::from_str(&json)?
			} else {
				BackupIndex::new()
			};
			*guard = Some(index);
		}
		Ok(guard.as_mut().expect("index just loaded"))
	}

	/// Durable index write: temp file plus rename.
	fn persist_index(&self, index: &BackupIndex) -> Result<(), BackupError> {
		if let Some(parent) = self.index_path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let tmp = self.index_path.with_extension("json.tmp");
		let json = serde_json::to_string_pretty(index)?;
		std::fs::write(&tmp, json)?;
		std::fs::rename(&tmp, &self.index_path)?;
		Ok(())
	}
}

fn sanitize_file_name(name: &str) -> String {
	name.chars()
		.map(|c| {
			if c.is_alphanumeric() || c == '-' || c == '_' {
				c
			} else {
				'_'
			}
		})
		.collect()
}
