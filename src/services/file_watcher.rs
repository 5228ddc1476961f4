//! Local file change watching
//!
//! One filesystem watch per target, registered on the file's parent
//! directory rather than the file itself — editors routinely save via
//! rename-replace, which would orphan a per-file watch. Events matching the
//! exact target file name are forwarded to the engine over a channel; the
//! watcher never touches engine state directly. The engine applies the real
//! debounce and write-back cool-down; this side only collapses the raw event
//! bursts every save produces.

use anyhow::{anyhow, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Raw bursts within this window collapse to one forwarded event
const BURST_WINDOW: Duration = Duration::from_millis(500);

struct WatchEntry {
	/// Keeps the OS-level watch alive; dropped on unwatch
	_watcher: RecommendedWatcher,
}

pub struct FileWatcher {
	event_tx: mpsc::UnboundedSender<Uuid>,
	watches: Mutex<HashMap<Uuid, WatchEntry>>,
}

impl FileWatcher {
	/// Create a watcher and the receiving end of its event channel.
	pub fn new() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
		let (event_tx, event_rx) = mpsc::unbounded_channel();
		(
			Self {
				event_tx,
				watches: Mutex::new(HashMap::new()),
			},
			event_rx,
		)
	}

	/// Register a watch for a target's local file. Replaces any existing
	/// watch for the same target id.
	pub async fn watch(&self, target_id: Uuid, file_path: &Path) -> Result<()> {
		let parent = file_path
			.parent()
			.ok_or_else(|| anyhow!("Path has no parent directory: {:?}", file_path))?
			.to_path_buf();
		let file_name: OsString = file_path
			.file_name()
			.ok_or_else(|| anyhow!("Path has no file name: {:?}", file_path))?
			.to_os_string();

		let tx = self.event_tx.clone();
		let last_forward: Arc<StdMutex<Option<Instant>>> = Arc::new(StdMutex::new(None));

		let mut watcher = notify::recommended_watcher(
			move |result: std::result::Result<Event, notify::Error>| {
				let event = match result {
					Ok(event) => event,
					Err(e) => {
						warn!("Watch error for target {}: {}", target_id, e);
						return;
					}
				};

				if !matches!(
					event.kind,
					EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
				) {
					return;
				}

				// Only the exact target file matters; sibling files in the
				// watched directory are ignored
				if !event
					.paths
					.iter()
					.any(|p| p.file_name() == Some(file_name.as_os_str()))
				{
					return;
				}

				let now = Instant::now();
				{
					let mut last = last_forward.lock().expect("watcher mutex poisoned");
					if last.is_some_and(|at| now.duration_since(at) < BURST_WINDOW) {
						return;
					}
					*last = Some(now);
				}

				let _ = tx.send(target_id);
			},
		)?;

		watcher.watch(&parent, RecursiveMode::NonRecursive)?;
		debug!(
			"Watching {:?} for changes to target {}",
			parent, target_id
		);

		// Replacing an entry drops the previous watcher and its OS handle
		self.watches
			.lock()
			.await
			.insert(target_id, WatchEntry { _watcher: watcher });
		Ok(())
	}

	/// Remove the watch for a target, releasing its OS handle.
	pub async fn unwatch(&self, target_id: Uuid) {
		if self.watches.lock().await.remove(&target_id).is_some() {
			debug!("Stopped watching target {}", target_id);
		}
	}

	/// Remove all watches.
	pub async fn stop_all(&self) {
		let mut watches = self.watches.lock().await;
		let count = watches.len();
		watches.clear();
		if count > 0 {
			info!("Stopped {} file watches", count);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_watch_forwards_matching_file_events() {
		let dir = TempDir::new().unwrap();
		let file_path = dir.path().join("grid.csv");
		std::fs::write(&file_path, "a,b\n").unwrap();

		let (watcher, mut rx) = FileWatcher::new();
		let id = Uuid::new_v4();
		watcher.watch(id, &file_path).await.unwrap();

		std::fs::write(&file_path, "a,b,c\n").unwrap();

		let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
			.await
			.expect("no watch event arrived")
			.unwrap();
		assert_eq!(received, id);
	}

	#[tokio::test]
	async fn test_sibling_files_are_ignored() {
		let dir = TempDir::new().unwrap();
		let file_path = dir.path().join("grid.csv");
		std::fs::write(&file_path, "a\n").unwrap();

		let (watcher, mut rx) = FileWatcher::new();
		watcher.watch(Uuid::new_v4(), &file_path).await.unwrap();

		std::fs::write(dir.path().join("other.csv"), "x\n").unwrap();

		let result = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
		assert!(result.is_err(), "event for unrelated file was forwarded");
	}

	#[tokio::test]
	async fn test_unwatch_releases_handle() {
		let dir = TempDir::new().unwrap();
		let file_path = dir.path().join("grid.csv");
		std::fs::write(&file_path, "a\n").unwrap();

		let (watcher, mut rx) = FileWatcher::new();
		let id = Uuid::new_v4();
		watcher.watch(id, &file_path).await.unwrap();
		watcher.unwatch(id).await;

		std::fs::write(&file_path, "changed\n").unwrap();

		let result = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
		assert!(result.is_err(), "event arrived after unwatch");
	}
}
