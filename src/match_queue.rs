/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::Arc;

use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;

use crate::{
	TimeFn,
	coordinator::{Coordinator, EnqueueOutcome},
	entry::{Match, Meta},
	error::QueueError,
	monotonic_time_fn,
	policy::{DeferredCappedPolicy, MatchPolicy},
	publisher::{Publisher, SubscriptionHub},
	status::QueueStatus,
	store::{MemStore, QueueStore},
	worker::{TimerEvent, TimerWorker, register_worker},
};

pub const DEFAULT_MAX_MATCH_HISTORY: usize = 100;

/// Construction-time wiring for a [`MatchQueue`]. Every collaborator is
/// injectable; the defaults wire the in-memory store, the deferred-capped
/// policy, the subscription hub, and a monotonic clock.
pub struct MatchQueueConfig {
	pub store: Box<dyn QueueStore>,
	pub policy: Box<dyn MatchPolicy>,
	pub publisher: Arc<dyn Publisher>,
	pub time_fn: TimeFn,
	pub max_match_history: usize,
}

impl Default for MatchQueueConfig {
	fn default() -> Self {
		MatchQueueConfig {
			store: Box::new(MemStore::new()),
			policy: Box::new(DeferredCappedPolicy::default()),
			publisher: Arc::new(SubscriptionHub::new()),
			time_fn: monotonic_time_fn(),
			max_match_history: DEFAULT_MAX_MATCH_HISTORY,
		}
	}
}

/// A real-time matchmaking queue. Requests arrive with a rank; each is
/// paired with the queued opponent at the smallest rank difference, earliest
/// arrival first, and completed matches are published to both users'
/// subscription topics.
///
/// All operations serialize on an internal lock held for the whole call, so
/// enqueues, timer ticks, and retries never interleave.
pub struct MatchQueue {
	coordinator: Arc<Mutex<Coordinator>>,
	timer: Sender<TimerEvent>,
}

impl MatchQueue {
	#[must_use]
	pub fn new(config: MatchQueueConfig) -> Self {
		let initial_timeout = config.policy.initial_timeout();

		let coordinator = Arc::new(Mutex::new(Coordinator::new(
			config.store,
			config.policy,
			config.publisher,
			config.time_fn,
			config.max_match_history,
		)));

		let (timer, control) = unbounded();

		register_worker(TimerWorker::new(
			control,
			coordinator.clone(),
			initial_timeout,
		));

		MatchQueue {
			coordinator,
			timer,
		}
	}

	/// Queues a request, or pairs it immediately when the policy authorizes
	/// an attempt and an opponent is in range.
	pub fn enqueue(&self, user_id: &str, rank: i64) -> Result<EnqueueOutcome, QueueError> {
		self.enqueue_with_meta(user_id, rank, Meta::new())
	}

	/// Like [`MatchQueue::enqueue`], with free-form attributes attached to
	/// the request for policies to read.
	pub fn enqueue_with_meta(
		&self,
		user_id: &str,
		rank: i64,
		meta: Meta,
	) -> Result<EnqueueOutcome, QueueError> {
		self.coordinator.lock().enqueue(user_id, rank, meta)
	}

	/// Returns up to `limit` of the most recent matches, oldest first.
	#[must_use]
	pub fn recent_matches(&self, limit: usize) -> Vec<Match> {
		self.coordinator.lock().recent_matches(limit)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.coordinator.lock().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	#[must_use]
	pub fn status(&self) -> QueueStatus {
		self.coordinator.lock().status()
	}

	/// Stops the timer worker and terminates the policy. Idempotent; queued
	/// entries are lost with the process by design.
	pub fn stop(&self) {
		let _ = self.timer.send(TimerEvent::Shutdown);
		self.coordinator.lock().shutdown();
	}
}

impl Drop for MatchQueue {
	fn drop(&mut self) {
		self.stop();
	}
}
