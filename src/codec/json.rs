//! Multi-tab JSON codec
//!
//! Document shape: `{"tabs": [{"name": "...", "rows": [["..."]]}], ...}`.
//! Tab order in the array is the remote's native order.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::codec::FileCodecError;
use crate::domain::{CellSnapshot, SheetSnapshot};

#[derive(Serialize, Deserialize)]
struct JsonDocument {
	tabs: Vec<JsonTab>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	conflicts: Vec<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
struct JsonTab {
	name: String,
	rows: Vec<Vec<String>>,
}

pub(super) fn read(path: &Path) -> Result<SheetSnapshot, FileCodecError> {
	let content = std::fs::read_to_string(path).map_err(|e| FileCodecError::from_io(e, path))?;
	let doc: JsonDocument =
		serde_json::from_str(&content).map_err(|e| FileCodecError::Parse(e.to_string()))?;

	let tabs = doc
		.tabs
		.into_iter()
		.map(|t| CellSnapshot::new(t.name, t.rows))
		.collect();

	Ok(SheetSnapshot::new("", tabs))
}

pub(super) fn write(
	snapshot: &SheetSnapshot,
	path: &Path,
	conflict_markers: &[Vec<String>],
) -> Result<(), FileCodecError> {
	let doc = JsonDocument {
		tabs: snapshot
			.tabs_in_order()
			.map(|t| JsonTab {
				name: t.tab_name.clone(),
				rows: t.rows.clone(),
			})
			.collect(),
		conflicts: conflict_markers.to_vec(),
	};

	let json =
		serde_json::to_string_pretty(&doc).map_err(|e| FileCodecError::Parse(e.to_string()))?;
	std::fs::write(path, json).map_err(|e| FileCodecError::from_io(e, path))
}
