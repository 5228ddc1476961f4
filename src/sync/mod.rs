//! Change detection, conflict resolution, and sync orchestration

pub mod detector;
pub mod engine;
pub mod resolver;

pub use detector::{ChangeDetector, SnapshotStore, SnapshotStoreError};
pub use engine::{AlwaysConfirm, FirstSyncConfirmer, SyncEngine, SyncOutcome, SyncSummary};
pub use resolver::{ConflictInfo, ConflictResolver, ConflictWinner, Resolution, WINNER_RULE};
