//! Event bus for decoupled communication
//!
//! Doubles as the notification sink: conflict, error, and backup events are
//! emitted fire-and-forget and never awaited, so they can never fail a sync.

use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Sync-related events
#[derive(Debug, Clone)]
pub enum Event {
	/// Core has started
	CoreStarted,

	/// Core is shutting down
	CoreShutdown,

	/// A sync target was added
	TargetAdded { target_id: Uuid, local_path: PathBuf },

	/// A sync target was removed
	TargetRemoved { target_id: Uuid },

	/// A sync attempt started
	SyncStarted { target_id: Uuid },

	/// A sync attempt completed successfully
	SyncCompleted {
		target_id: Uuid,
		uploaded: usize,
		downloaded: bool,
		conflicts: usize,
	},

	/// A sync attempt failed
	SyncFailed { target_id: Uuid, error: String },

	/// Conflicts were resolved during a sync; `rule` names the winner policy
	ConflictsResolved {
		target_id: Uuid,
		count: usize,
		rule: &'static str,
	},

	/// A backup was written
	BackupCreated {
		target_id: Uuid,
		backup_id: Uuid,
		file_size_bytes: u64,
	},

	/// A backup attempt failed (isolated; the surrounding sync continues)
	BackupFailed { target_id: Uuid, error: String },

	/// Old backups were pruned to fit the storage budget
	BackupsPruned { deleted: usize, freed_bytes: u64 },

	/// The local file of a target changed on disk
	LocalFileChanged { target_id: Uuid },
}

/// Event bus for broadcasting events
pub struct EventBus {
	sender: broadcast::Sender<Event>,
}

impl EventBus {
	/// Create a new event bus with specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Emit an event
	pub fn emit(&self, event: Event) {
		// Ignore send errors (no receivers)
		let _ = self.sender.send(event);
	}

	/// Subscribe to events
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}
