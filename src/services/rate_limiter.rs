//! Process-wide rate limiting for remote API calls
//!
//! Two independent sliding-window budgets (reads and writes) mirror the
//! remote service's account-wide quota, so one instance is shared by every
//! sync target. An explicit rate-limit signal from the remote puts the whole
//! limiter into backoff: 1s seed, doubling on repeated signals, capped at
//! 64s, reset on the first clean call afterwards.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Sliding window length for both budgets
const WINDOW: Duration = Duration::from_secs(60);

/// First backoff delay after a rate-limit signal
const BACKOFF_SEED: Duration = Duration::from_secs(1);

/// Ceiling for escalated backoff delays
const BACKOFF_CAP: Duration = Duration::from_secs(64);

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
	pub reads_per_minute: usize,
	pub writes_per_minute: usize,
}

impl Default for RateLimiterConfig {
	fn default() -> Self {
		Self {
			reads_per_minute: 60,
			writes_per_minute: 60,
		}
	}
}

struct BackoffState {
	/// Callers block until this instant while set in the future
	until: Option<Instant>,
	/// Delay to apply on the next rate-limit signal
	next_delay: Duration,
}

pub struct RateLimiter {
	config: RateLimiterConfig,
	reads: Mutex<VecDeque<Instant>>,
	writes: Mutex<VecDeque<Instant>>,
	backoff: Mutex<BackoffState>,
}

impl RateLimiter {
	pub fn new(config: RateLimiterConfig) -> Self {
		Self {
			config,
			reads: Mutex::new(VecDeque::new()),
			writes: Mutex::new(VecDeque::new()),
			backoff: Mutex::new(BackoffState {
				until: None,
				next_delay: BACKOFF_SEED,
			}),
		}
	}

	/// Block the calling task until a read slot is free.
	pub async fn wait_for_read_slot(&self) {
		self.wait_for_backoff().await;
		Self::wait_for_slot(&self.reads, self.config.reads_per_minute).await;
	}

	/// Block the calling task until a write slot is free.
	pub async fn wait_for_write_slot(&self) {
		self.wait_for_backoff().await;
		Self::wait_for_slot(&self.writes, self.config.writes_per_minute).await;
	}

	/// Record an explicit rate-limit signal from the remote. All callers
	/// block until the backoff elapses; repeated signals escalate the delay.
	pub async fn report_rate_limited(&self, retry_after: Option<Duration>) {
		let mut backoff = self.backoff.lock().await;
		let mut delay = backoff.next_delay;
		// An explicit retry-after hint wins when it is longer
		if let Some(hint) = retry_after {
			delay = delay.max(hint);
		}

		backoff.until = Some(Instant::now() + delay);
		backoff.next_delay = (backoff.next_delay * 2).min(BACKOFF_CAP);
		warn!(delay_secs = delay.as_secs(), "Rate limited, backing off");
	}

	/// Record a clean call after backoff; resets the escalation to the seed.
	pub async fn report_success(&self) {
		let mut backoff = self.backoff.lock().await;
		if backoff.next_delay > BACKOFF_SEED {
			debug!("Rate limit backoff reset");
		}
		backoff.next_delay = BACKOFF_SEED;
	}

	async fn wait_for_backoff(&self) {
		loop {
			let until = self.backoff.lock().await.until;
			match until {
				Some(until) if until > Instant::now() => {
					tokio::time::sleep_until(until).await;
				}
				_ => return,
			}
		}
	}

	async fn wait_for_slot(window: &Mutex<VecDeque<Instant>>, cap: usize) {
		loop {
			let wait = {
				let mut timestamps = window.lock().await;
				let now = Instant::now();

				// Slide the window
				while timestamps
					.front()
					.is_some_and(|&t| now.duration_since(t) >= WINDOW)
				{
					timestamps.pop_front();
				}

				if timestamps.len() < cap {
					timestamps.push_back(now);
					return;
				}

				// Oldest entry decides when the next slot opens
				let oldest = *timestamps.front().expect("window is non-empty at cap");
				WINDOW - now.duration_since(oldest)
			};

			tokio::time::sleep(wait).await;
		}
	}
}
