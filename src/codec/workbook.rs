//! Multi-tab xlsx workbook codec
//!
//! Reads via calamine, writes via rust_xlsxwriter. All cells are written as
//! strings; typed values found in externally-edited workbooks are
//! stringified on read, matching the remote service's value model.

use calamine::{open_workbook, Data, Reader, Xlsx};
use std::path::Path;

use crate::codec::FileCodecError;
use crate::domain::{CellSnapshot, SheetSnapshot};

pub(super) fn read(path: &Path) -> Result<SheetSnapshot, FileCodecError> {
	let mut workbook: Xlsx<_> = open_workbook(path)
		.map_err(|e: calamine::XlsxError| FileCodecError::Parse(e.to_string()))?;

	let sheet_names = workbook.sheet_names().to_owned();
	let mut tabs = Vec::with_capacity(sheet_names.len());

	for sheet_name in sheet_names {
		let range = workbook
			.worksheet_range(&sheet_name)
			.map_err(|e| FileCodecError::Parse(e.to_string()))?;

		// calamine Range iterators return coordinates relative to start()
		let (start_row, start_col) = range.start().unwrap_or((0, 0));

		let mut rows: Vec<Vec<String>> = Vec::new();
		for (row, col, value) in range.used_cells() {
			let value = stringify(value);
			if value.is_empty() {
				continue;
			}

			let abs_row = start_row as usize + row;
			let abs_col = start_col as usize + col;
			if rows.len() <= abs_row {
				rows.resize(abs_row + 1, Vec::new());
			}
			if rows[abs_row].len() <= abs_col {
				rows[abs_row].resize(abs_col + 1, String::new());
			}
			rows[abs_row][abs_col] = value;
		}

		tabs.push(CellSnapshot::new(sheet_name, rows));
	}

	Ok(SheetSnapshot::new("", tabs))
}

pub(super) fn write(
	snapshot: &SheetSnapshot,
	path: &Path,
	conflict_markers: &[Vec<String>],
) -> Result<(), FileCodecError> {
	let mut workbook = rust_xlsxwriter::Workbook::new();

	let tab_count = snapshot.tab_order.len();
	for (index, tab) in snapshot.tabs_in_order().enumerate() {
		let worksheet = workbook.add_worksheet();
		worksheet
			.set_name(&tab.tab_name)
			.map_err(|e| FileCodecError::Parse(e.to_string()))?;

		let mut next_row = 0u32;
		for row in &tab.rows {
			for (col, value) in row.iter().enumerate() {
				if value.is_empty() {
					continue;
				}
				worksheet
					.write_string(next_row, col as u16, value)
					.map_err(|e| FileCodecError::Parse(e.to_string()))?;
			}
			next_row += 1;
		}

		// Audit rows land after the grid of the last tab
		if index + 1 == tab_count {
			for marker in conflict_markers {
				for (col, value) in marker.iter().enumerate() {
					worksheet
						.write_string(next_row, col as u16, value)
						.map_err(|e| FileCodecError::Parse(e.to_string()))?;
				}
				next_row += 1;
			}
		}
	}

	workbook
		.save(path)
		.map_err(|e| match e {
			rust_xlsxwriter::XlsxError::IoError(io_err) => FileCodecError::from_io(io_err, path),
			other => FileCodecError::Parse(other.to_string()),
		})
}

fn stringify(value: &Data) -> String {
	match value {
		Data::Empty => String::new(),
		Data::String(s) => s.clone(),
		Data::Float(f) => format!("{}", f),
		Data::Int(i) => i.to_string(),
		Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
		Data::DateTime(dt) => dt.to_string(),
		Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
		Data::Error(e) => format!("{:?}", e),
	}
}
