//! Domain model for grid synchronization

pub mod backup;
pub mod change;
pub mod snapshot;
pub mod target;

pub use backup::BackupMetadata;
pub use change::{CellAddress, CellChange, ChangeSource, ChangeType};
pub use snapshot::{hash_cell, CellSnapshot, SheetSnapshot};
pub use target::{
	BackupPolicy, FileEncoding, SyncStatus, SyncTarget, TargetState, MIN_SYNC_INTERVAL_SECS,
};
