//! Single-tab CSV codec
//!
//! CSV cannot carry multiple tabs; writing takes the first tab in remote
//! order and reading produces a single tab named after the file stem. The
//! engine re-aligns that name against the remote's tab set.

use std::path::Path;

use crate::codec::FileCodecError;
use crate::domain::{CellSnapshot, SheetSnapshot};

pub(super) fn read(path: &Path) -> Result<SheetSnapshot, FileCodecError> {
	let mut reader = csv::ReaderBuilder::new()
		.has_headers(false)
		.flexible(true)
		.from_path(path)
		.map_err(|e| classify_csv_error(e, path))?;

	let mut rows = Vec::new();
	for record in reader.records() {
		let record = record.map_err(|e| classify_csv_error(e, path))?;
		rows.push(record.iter().map(str::to_string).collect());
	}

	let tab_name = path
		.file_stem()
		.and_then(|s| s.to_str())
		.unwrap_or("Sheet1")
		.to_string();

	Ok(SheetSnapshot::new("", vec![CellSnapshot::new(tab_name, rows)]))
}

pub(super) fn write(
	snapshot: &SheetSnapshot,
	path: &Path,
	conflict_markers: &[Vec<String>],
) -> Result<(), FileCodecError> {
	let mut writer = csv::WriterBuilder::new()
		.flexible(true)
		.from_path(path)
		.map_err(|e| classify_csv_error(e, path))?;

	if let Some(tab) = snapshot.tabs_in_order().next() {
		for row in &tab.rows {
			write_record(&mut writer, row, path)?;
		}
	}

	for marker in conflict_markers {
		write_record(&mut writer, marker, path)?;
	}

	writer.flush().map_err(|e| FileCodecError::from_io(e, path))
}

fn write_record(
	writer: &mut csv::Writer<std::fs::File>,
	row: &[String],
	path: &Path,
) -> Result<(), FileCodecError> {
	// The csv crate rejects fully empty records under flexible mode
	if row.is_empty() {
		writer
			.write_record([""])
			.map_err(|e| classify_csv_error(e, path))
	} else {
		writer
			.write_record(row)
			.map_err(|e| classify_csv_error(e, path))
	}
}

fn classify_csv_error(err: csv::Error, path: &Path) -> FileCodecError {
	if err.is_io_error() {
		match err.into_kind() {
			csv::ErrorKind::Io(io_err) => FileCodecError::from_io(io_err, path),
			other => FileCodecError::Parse(format!("{:?}", other)),
		}
	} else {
		FileCodecError::Parse(err.to_string())
	}
}
