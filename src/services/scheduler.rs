//! Per-target periodic sync timers
//!
//! One spawned timer task per target sends tick messages over a channel; the
//! engine side of the channel decides whether a tick actually turns into a
//! sync. Rescheduling replaces the timer; cancelling aborts it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub struct SyncScheduler {
	tick_tx: mpsc::UnboundedSender<Uuid>,
	timers: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
}

impl SyncScheduler {
	/// Create a scheduler and the receiving end of its tick channel.
	pub fn new() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
		let (tick_tx, tick_rx) = mpsc::unbounded_channel();
		(
			Self {
				tick_tx,
				timers: Arc::new(Mutex::new(HashMap::new())),
			},
			tick_rx,
		)
	}

	/// Start (or restart) the periodic timer for a target.
	pub async fn schedule(&self, target_id: Uuid, interval: Duration) {
		let tx = self.tick_tx.clone();

		let handle = tokio::spawn(async move {
			let mut timer = tokio::time::interval(interval);
			// The first tick fires immediately; the engine already syncs on
			// startup, so skip it.
			timer.tick().await;

			loop {
				timer.tick().await;
				if tx.send(target_id).is_err() {
					break;
				}
			}
		});

		let previous = self.timers.lock().await.insert(target_id, handle);
		if let Some(previous) = previous {
			previous.abort();
			debug!("Rescheduled timer for target {}", target_id);
		} else {
			debug!(
				"Scheduled timer for target {} every {}s",
				target_id,
				interval.as_secs()
			);
		}
	}

	/// Cancel the timer for a target, if any.
	pub async fn cancel(&self, target_id: Uuid) {
		if let Some(handle) = self.timers.lock().await.remove(&target_id) {
			handle.abort();
			debug!("Cancelled timer for target {}", target_id);
		}
	}

	/// Cancel all timers.
	pub async fn cancel_all(&self) {
		let mut timers = self.timers.lock().await;
		let count = timers.len();
		for (_, handle) in timers.drain() {
			handle.abort();
		}
		if count > 0 {
			info!("Cancelled {} sync timers", count);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn test_ticks_arrive_on_interval() {
		let (scheduler, mut rx) = SyncScheduler::new();
		let id = Uuid::new_v4();

		scheduler.schedule(id, Duration::from_secs(30)).await;

		tokio::time::advance(Duration::from_secs(31)).await;
		assert_eq!(rx.recv().await, Some(id));
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancel_stops_ticks() {
		let (scheduler, mut rx) = SyncScheduler::new();
		let id = Uuid::new_v4();

		scheduler.schedule(id, Duration::from_secs(30)).await;
		scheduler.cancel(id).await;

		tokio::time::advance(Duration::from_secs(120)).await;
		assert!(rx.try_recv().is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_reschedule_replaces_timer() {
		let (scheduler, mut rx) = SyncScheduler::new();
		let id = Uuid::new_v4();

		scheduler.schedule(id, Duration::from_secs(600)).await;
		scheduler.schedule(id, Duration::from_secs(30)).await;

		tokio::time::advance(Duration::from_secs(31)).await;
		assert_eq!(rx.recv().await, Some(id));
	}
}
