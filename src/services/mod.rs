//! Background services

use std::sync::Arc;
use tracing::info;

pub mod file_watcher;
pub mod rate_limiter;
pub mod scheduler;

pub use file_watcher::FileWatcher;
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use scheduler::SyncScheduler;

/// Container for all background services
pub struct Services {
	/// File system watcher for target local files
	pub file_watcher: Arc<FileWatcher>,

	/// Per-target periodic sync timers
	pub scheduler: Arc<SyncScheduler>,

	/// Shared remote API rate limiter
	pub rate_limiter: Arc<RateLimiter>,
}

impl Services {
	/// Stop all services gracefully. In-flight syncs are left to finish;
	/// only the triggers (timers and watches) are torn down.
	pub async fn stop_all(&self) {
		info!("Stopping background services");
		self.scheduler.cancel_all().await;
		self.file_watcher.stop_all().await;
	}
}
