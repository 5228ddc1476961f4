//! Local file gateway and codecs
//!
//! The engine treats the local file as a black box behind
//! [`LocalFileGateway`]: read a path into a snapshot, write a snapshot back
//! out. Three encodings are built in: single-tab CSV, multi-tab JSON, and
//! multi-tab xlsx workbooks.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{FileEncoding, SheetSnapshot};

mod csv;
mod json;
mod workbook;

/// Local filesystem failures, classified for the engine's retry policy
#[derive(Error, Debug)]
pub enum FileCodecError {
	/// File does not exist
	#[error("File not found: {0}")]
	NotFound(PathBuf),

	/// File is held by another process
	#[error("File is locked: {0}")]
	Locked(PathBuf),

	/// The disk is full
	#[error("Disk full writing {0}")]
	DiskFull(PathBuf),

	/// Content could not be decoded in the requested encoding
	#[error("Parse error: {0}")]
	Parse(String),

	/// Other IO error
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl FileCodecError {
	/// Classify an IO error against the path being accessed.
	fn from_io(err: std::io::Error, path: &Path) -> Self {
		match err.kind() {
			std::io::ErrorKind::NotFound => FileCodecError::NotFound(path.to_path_buf()),
			std::io::ErrorKind::PermissionDenied => FileCodecError::Locked(path.to_path_buf()),
			// ENOSPC has no stable ErrorKind yet
			_ if err.raw_os_error() == Some(28) => FileCodecError::DiskFull(path.to_path_buf()),
			_ => FileCodecError::Io(err),
		}
	}
}

/// Read/write boundary for the local file side of a sync target
#[async_trait]
pub trait LocalFileGateway: Send + Sync {
	/// Read the file into a snapshot. The returned snapshot carries an empty
	/// `remote_sheet_id`; only its tabs participate in diffing.
	async fn read(
		&self,
		path: &Path,
		encoding: FileEncoding,
	) -> Result<SheetSnapshot, FileCodecError>;

	/// Write a snapshot to the file, replacing previous content.
	/// `conflict_markers` are extra audit rows appended after the grid of the
	/// last tab (empty slice = none).
	async fn write(
		&self,
		snapshot: &SheetSnapshot,
		path: &Path,
		encoding: FileEncoding,
		conflict_markers: &[Vec<String>],
	) -> Result<(), FileCodecError>;
}

/// Built-in gateway dispatching on the target's encoding
#[derive(Default)]
pub struct DefaultFileGateway;

#[async_trait]
impl LocalFileGateway for DefaultFileGateway {
	async fn read(
		&self,
		path: &Path,
		encoding: FileEncoding,
	) -> Result<SheetSnapshot, FileCodecError> {
		if !path.exists() {
			return Err(FileCodecError::NotFound(path.to_path_buf()));
		}
		match encoding {
			FileEncoding::Csv => csv::read(path),
			FileEncoding::Json => json::read(path),
			FileEncoding::Workbook => workbook::read(path),
		}
	}

	async fn write(
		&self,
		snapshot: &SheetSnapshot,
		path: &Path,
		encoding: FileEncoding,
		conflict_markers: &[Vec<String>],
	) -> Result<(), FileCodecError> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(|e| FileCodecError::from_io(e, path))?;
		}
		match encoding {
			FileEncoding::Csv => csv::write(snapshot, path, conflict_markers),
			FileEncoding::Json => json::write(snapshot, path, conflict_markers),
			FileEncoding::Workbook => workbook::write(snapshot, path, conflict_markers),
		}
	}
}
