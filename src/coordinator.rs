/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::Arc;

use log::{debug, error, info, warn};
use kwik::{fmt, time};

use crate::{
	Handle,
	Rank,
	TimeFn,
	Timestamp,
	entry::{Match, Meta, QueueRequest},
	error::QueueError,
	history::MatchHistory,
	matcher,
	policy::{
		AttemptContext,
		EnqueueDecision,
		MatchMode,
		MatchPolicy,
		PolicyContext,
		RejectReason,
		Timeout,
	},
	publisher::Publisher,
	status::QueueStatus,
	store::{QueueStore, StoreError},
};

const MAX_USER_ID_CHARS: usize = 255;

/// Outcome of an accepted enqueue.
#[derive(Clone, Debug, PartialEq)]
pub enum EnqueueOutcome {
	/// The request was stored and is waiting for an opponent.
	Queued,

	/// The request was paired immediately.
	Matched(Match),
}

/// The single writer. Every mutation of the store, the policy, the match
/// history, and the counters runs through one of its methods, and the
/// enclosing mutex (held by `MatchQueue` for each whole call) guarantees no
/// two steps overlap.
pub(crate) struct Coordinator {
	store: Box<dyn QueueStore>,
	policy: Box<dyn MatchPolicy>,
	publisher: Arc<dyn Publisher>,
	history: MatchHistory,
	time_fn: TimeFn,

	total_enqueued: u64,
	total_matched: u64,
	total_rejected: u64,
	start_time: u64,

	stopped: bool,
}

impl Coordinator {
	pub fn new(
		store: Box<dyn QueueStore>,
		policy: Box<dyn MatchPolicy>,
		publisher: Arc<dyn Publisher>,
		time_fn: TimeFn,
		max_match_history: usize,
	) -> Self {
		Coordinator {
			store,
			policy,
			publisher,
			history: MatchHistory::new(max_match_history),
			time_fn,

			total_enqueued: 0,
			total_matched: 0,
			total_rejected: 0,
			start_time: time::timestamp(),

			stopped: false,
		}
	}

	pub fn enqueue(
		&mut self,
		user_id: &str,
		rank: i64,
		meta: Meta,
	) -> Result<EnqueueOutcome, QueueError> {
		let result = self.enqueue_inner(user_id, rank, meta);

		match &result {
			Ok(_) => self.total_enqueued += 1,
			Err(_) => self.total_rejected += 1,
		}

		result
	}

	fn enqueue_inner(
		&mut self,
		user_id: &str,
		rank: i64,
		meta: Meta,
	) -> Result<EnqueueOutcome, QueueError> {
		let (user_id, rank) = normalize(user_id, rank)?;
		let now = self.now();

		let request = QueueRequest {
			user_id,
			rank,
			inserted_at: now,
			meta,
		};

		let ctx = PolicyContext {
			queue_size: self.store.len(),
			now,
		};

		if let EnqueueDecision::Reject(reason) = self.policy.before_enqueue(&request, &ctx) {
			return Err(reject_error(reason));
		}

		let entry = self.store.insert(request).map_err(|err| match err {
			StoreError::Duplicate => QueueError::AlreadyEnqueued,
			other => QueueError::Queue(other.to_string()),
		})?;

		// the just-inserted entry counts toward the queue size the policy sees
		let ctx = PolicyContext {
			queue_size: self.store.len(),
			now,
		};

		match self.policy.matchmaking_mode(&entry, &ctx) {
			MatchMode::Attempt(attempt) => {
				let matched = matcher::attempt_match(
					self.store.as_mut(),
					self.policy.as_mut(),
					&entry,
					attempt,
					&ctx,
				)?;

				match matched {
					Some(matched) => {
						self.record(&matched);
						Ok(EnqueueOutcome::Matched(matched))
					},

					None => Ok(EnqueueOutcome::Queued),
				}
			},

			MatchMode::Defer => Ok(EnqueueOutcome::Queued),

			MatchMode::Cancel => {
				self.store.remove(entry.handle)
					.map_err(|err| QueueError::Queue(err.to_string()))?;

				Err(reject_error(RejectReason::Cancelled))
			},
		}
	}

	/// Re-attempts matching for one deferred handle. Handles that were
	/// matched or pruned since the tick was scheduled are dropped.
	pub fn retry(&mut self, handle: Handle, attempt: AttemptContext) {
		let Some(entry) = self.store.lookup(handle) else {
			debug!("Dropping stale retry for handle {handle}");
			return;
		};

		let ctx = self.context();

		let result = matcher::attempt_match(
			self.store.as_mut(),
			self.policy.as_mut(),
			&entry,
			attempt,
			&ctx,
		);

		match result {
			Ok(Some(matched)) => self.record(&matched),
			Ok(None) => {},

			Err(err) => error!("Could not retry handle {handle}: {err}"),
		}
	}

	/// Runs one timer tick and returns the delay until the next one.
	pub fn tick(&mut self) -> Timeout {
		let ctx = self.context();
		let outcome = self.policy.handle_timeout(&ctx);

		if !outcome.retries.is_empty() {
			info!(
				"Retrying {} deferred request(s)",
				fmt::number(outcome.retries.len()),
			);
		}

		for instruction in outcome.retries {
			self.retry(instruction.handle, instruction.attempt);
		}

		outcome.next_tick
	}

	pub fn recent_matches(&self, limit: usize) -> Vec<Match> {
		self.history.recent(limit)
	}

	pub fn len(&self) -> usize {
		self.store.len()
	}

	pub fn status(&self) -> QueueStatus {
		QueueStatus::new(
			self.store.len(),
			self.total_enqueued,
			self.total_matched,
			self.total_rejected,
			self.start_time,
		)
	}

	pub fn shutdown(&mut self) {
		if self.stopped {
			return;
		}

		self.stopped = true;
		self.policy.terminate();

		info!("Queue coordinator stopped");
	}

	fn record(&mut self, matched: &Match) {
		self.total_matched += 1;

		info!(
			"Matched {} with {} at delta {}",
			matched.entry().user_id,
			matched.candidate().user_id,
			matched.delta,
		);

		self.history.push(matched.clone());

		if let Err(err) = self.publisher.publish(matched) {
			warn!("Could not publish match: {err}");
		}
	}

	fn now(&self) -> Timestamp {
		(self.time_fn)()
	}

	fn context(&self) -> PolicyContext {
		PolicyContext {
			queue_size: self.store.len(),
			now: self.now(),
		}
	}
}

fn normalize(user_id: &str, rank: i64) -> Result<(Arc<str>, Rank), QueueError> {
	let trimmed = user_id.trim();

	if trimmed.is_empty() || trimmed.chars().count() > MAX_USER_ID_CHARS {
		return Err(QueueError::InvalidUserId);
	}

	if rank < 0 {
		return Err(QueueError::InvalidRank);
	}

	Ok((Arc::from(trimmed), rank as Rank))
}

fn reject_error(reason: RejectReason) -> QueueError {
	match reason {
		RejectReason::Duplicate => QueueError::AlreadyEnqueued,
		other => QueueError::PolicyRejected(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use std::{
		sync::{
			Arc,
			atomic::{AtomicU64, Ordering},
		},
		time::Duration,
	};

	use crate::{
		TimeFn,
		coordinator::{Coordinator, EnqueueOutcome},
		entry::{Entry, Meta, QueueRequest},
		error::QueueError,
		policy::{
			DeferredCappedConfig,
			DeferredCappedPolicy,
			DeltaCap,
			EnqueueDecision,
			MatchMode,
			MatchPolicy,
			PolicyContext,
			RejectReason,
		},
		publisher::SubscriptionHub,
		store::MemStore,
	};

	fn coordinator(policy: Box<dyn MatchPolicy>) -> (Coordinator, Arc<AtomicU64>) {
		let clock = Arc::new(AtomicU64::new(0));
		let time = clock.clone();
		let time_fn: TimeFn = Arc::new(move || time.load(Ordering::Relaxed));

		let coordinator = Coordinator::new(
			Box::new(MemStore::new()),
			policy,
			Arc::new(SubscriptionHub::new()),
			time_fn,
			100,
		);

		(coordinator, clock)
	}

	fn deferred(min_queue: usize) -> Box<dyn MatchPolicy> {
		Box::new(DeferredCappedPolicy::new(DeferredCappedConfig {
			min_queue,
			max_wait: None,
			tick: None,
			..DeferredCappedConfig::default()
		}))
	}

	fn enqueue(
		coordinator: &mut Coordinator,
		clock: &Arc<AtomicU64>,
		user_id: &str,
		rank: i64,
	) -> Result<EnqueueOutcome, QueueError> {
		clock.fetch_add(1, Ordering::Relaxed);
		coordinator.enqueue(user_id, rank, Meta::new())
	}

	fn expect_match(outcome: Result<EnqueueOutcome, QueueError>) -> crate::entry::Match {
		match outcome {
			Ok(EnqueueOutcome::Matched(matched)) => matched,
			other => panic!("expected a match, got {other:?}"),
		}
	}

	#[test]
	fn it_matches_equal_ranks_immediately() {
		let (mut coordinator, clock) = coordinator(deferred(2));

		assert_eq!(
			enqueue(&mut coordinator, &clock, "A", 1500),
			Ok(EnqueueOutcome::Queued),
		);

		let matched = expect_match(enqueue(&mut coordinator, &clock, "B", 1500));

		assert_eq!(matched.entry().user_id.as_ref(), "B");
		assert_eq!(matched.candidate().user_id.as_ref(), "A");
		assert_eq!(matched.delta, 0);
		assert_eq!(coordinator.len(), 0);
	}

	#[test]
	fn it_pairs_fifo_within_a_rank() {
		let (mut coordinator, clock) = coordinator(deferred(4));

		enqueue(&mut coordinator, &clock, "A", 1100).unwrap();
		enqueue(&mut coordinator, &clock, "B", 1100).unwrap();

		assert_eq!(
			enqueue(&mut coordinator, &clock, "C", 1200),
			Ok(EnqueueOutcome::Queued),
		);

		let matched = expect_match(enqueue(&mut coordinator, &clock, "new", 1100));

		assert_eq!(matched.entry().user_id.as_ref(), "new");
		assert_eq!(matched.candidate().user_id.as_ref(), "A");
		assert_eq!(matched.delta, 0);

		// B and C stay live
		assert_eq!(coordinator.len(), 2);

		assert_eq!(
			enqueue(&mut coordinator, &clock, "B", 1100),
			Err(QueueError::AlreadyEnqueued),
		);

		assert_eq!(
			enqueue(&mut coordinator, &clock, "A", 1100),
			Ok(EnqueueOutcome::Queued),
		);
	}

	#[test]
	fn it_expands_to_the_only_candidate() {
		let (mut coordinator, clock) = coordinator(deferred(2));

		assert_eq!(
			enqueue(&mut coordinator, &clock, "p1", 1000),
			Ok(EnqueueOutcome::Queued),
		);

		let matched = expect_match(enqueue(&mut coordinator, &clock, "p2", 1050));

		assert_eq!(matched.entry().user_id.as_ref(), "p2");
		assert_eq!(matched.candidate().user_id.as_ref(), "p1");
		assert_eq!(matched.delta, 50);

		assert_eq!(
			enqueue(&mut coordinator, &clock, "p3", 1200),
			Ok(EnqueueOutcome::Queued),
		);

		let matched = expect_match(enqueue(&mut coordinator, &clock, "new", 1051));

		assert_eq!(matched.entry().user_id.as_ref(), "new");
		assert_eq!(matched.candidate().user_id.as_ref(), "p3");
		assert_eq!(matched.delta, 149);
	}

	#[test]
	fn it_prefers_the_closest_band_over_arrival() {
		let (mut coordinator, clock) = coordinator(deferred(4));

		enqueue(&mut coordinator, &clock, "p1", 1095).unwrap();
		enqueue(&mut coordinator, &clock, "p2", 1103).unwrap();
		enqueue(&mut coordinator, &clock, "p3", 1101).unwrap();

		let matched = expect_match(enqueue(&mut coordinator, &clock, "new", 1100));

		assert_eq!(matched.candidate().user_id.as_ref(), "p3");
		assert_eq!(matched.delta, 1);
	}

	#[test]
	fn it_matches_at_rank_zero() {
		let (mut coordinator, clock) = coordinator(deferred(2));

		enqueue(&mut coordinator, &clock, "a", 0).unwrap();

		let matched = expect_match(enqueue(&mut coordinator, &clock, "b", 0));

		assert_eq!(matched.delta, 0);
	}

	struct CancelPolicy;

	impl MatchPolicy for CancelPolicy {
		fn matchmaking_mode(&mut self, _entry: &Entry, _ctx: &PolicyContext) -> MatchMode {
			MatchMode::Cancel
		}
	}

	#[test]
	fn it_cancels_when_the_policy_says_so() {
		let (mut coordinator, clock) = coordinator(Box::new(CancelPolicy));

		let err = enqueue(&mut coordinator, &clock, "x", 500).unwrap_err();

		assert_eq!(err, QueueError::PolicyRejected("cancelled".into()));
		assert_eq!(err.to_string(), "policy rejected: cancelled");
		assert_eq!(coordinator.len(), 0);

		// the cancelled user may enqueue again
		let err = enqueue(&mut coordinator, &clock, "x", 500).unwrap_err();
		assert_eq!(err, QueueError::PolicyRejected("cancelled".into()));
	}

	struct ClosedPolicy;

	impl MatchPolicy for ClosedPolicy {
		fn before_enqueue(&mut self, _request: &QueueRequest, _ctx: &PolicyContext) -> EnqueueDecision {
			EnqueueDecision::Reject(RejectReason::Custom("queue closed".into()))
		}

		fn matchmaking_mode(&mut self, _entry: &Entry, _ctx: &PolicyContext) -> MatchMode {
			MatchMode::Defer
		}
	}

	#[test]
	fn it_surfaces_policy_rejections() {
		let (mut coordinator, clock) = coordinator(Box::new(ClosedPolicy));

		let err = enqueue(&mut coordinator, &clock, "x", 500).unwrap_err();

		assert_eq!(err, QueueError::PolicyRejected("queue closed".into()));
		assert_eq!(coordinator.len(), 0);
	}

	#[test]
	fn it_retries_deferred_entries_after_the_wait() {
		let policy = Box::new(DeferredCappedPolicy::new(DeferredCappedConfig {
			min_queue: 10,
			max_wait: Some(Duration::from_millis(100)),
			tick: Some(Duration::from_millis(10)),
			initial_delta: DeltaCap::Bounded(0),
			relaxed_delta: DeltaCap::Unbounded,
		}));

		let (mut coordinator, clock) = coordinator(policy);

		clock.store(0, Ordering::Relaxed);

		assert_eq!(
			coordinator.enqueue("a", 100, Meta::new()),
			Ok(EnqueueOutcome::Queued),
		);

		clock.store(1, Ordering::Relaxed);

		assert_eq!(
			coordinator.enqueue("b", 200, Meta::new()),
			Ok(EnqueueOutcome::Queued),
		);

		clock.store(101, Ordering::Relaxed);

		assert_eq!(coordinator.tick(), Some(Duration::from_millis(10)));
		assert_eq!(coordinator.len(), 0);

		let matches = coordinator.recent_matches(10);

		assert_eq!(matches.len(), 1);
		assert_eq!(matches[0].delta, 100);
		assert!(matches[0].context.relaxed);

		// a waited longest and is retried first
		assert_eq!(matches[0].entry().user_id.as_ref(), "a");
		assert_eq!(matches[0].candidate().user_id.as_ref(), "b");
	}

	#[test]
	fn it_validates_user_ids() {
		let (mut coordinator, clock) = coordinator(deferred(100));

		assert_eq!(
			enqueue(&mut coordinator, &clock, "", 100),
			Err(QueueError::InvalidUserId),
		);

		assert_eq!(
			enqueue(&mut coordinator, &clock, "   ", 100),
			Err(QueueError::InvalidUserId),
		);

		assert_eq!(
			enqueue(&mut coordinator, &clock, &"x".repeat(256), 100),
			Err(QueueError::InvalidUserId),
		);

		assert_eq!(
			enqueue(&mut coordinator, &clock, &"x".repeat(255), 100),
			Ok(EnqueueOutcome::Queued),
		);

		assert_eq!(
			enqueue(&mut coordinator, &clock, "プレイヤー★7", 100),
			Ok(EnqueueOutcome::Queued),
		);
	}

	#[test]
	fn it_trims_whitespace_before_uniqueness() {
		let (mut coordinator, clock) = coordinator(deferred(100));

		enqueue(&mut coordinator, &clock, "A", 1500).unwrap();

		assert_eq!(
			enqueue(&mut coordinator, &clock, "  A  ", 1500),
			Err(QueueError::AlreadyEnqueued),
		);

		assert_eq!(coordinator.len(), 1);
	}

	#[test]
	fn it_rejects_negative_ranks() {
		let (mut coordinator, clock) = coordinator(deferred(100));

		assert_eq!(
			enqueue(&mut coordinator, &clock, "a", -1),
			Err(QueueError::InvalidRank),
		);

		assert_eq!(
			enqueue(&mut coordinator, &clock, "a", 0),
			Ok(EnqueueOutcome::Queued),
		);
	}

	#[test]
	fn it_returns_recent_matches_oldest_first() {
		let (mut coordinator, clock) = coordinator(deferred(2));

		for (left, right, rank) in [("a1", "a2", 100), ("b1", "b2", 200), ("c1", "c2", 300)] {
			enqueue(&mut coordinator, &clock, left, rank).unwrap();
			expect_match(enqueue(&mut coordinator, &clock, right, rank));
		}

		let matches = coordinator.recent_matches(2);

		assert_eq!(matches.len(), 2);
		assert_eq!(matches[0].entry().user_id.as_ref(), "b2");
		assert_eq!(matches[1].entry().user_id.as_ref(), "c2");
		assert!(matches[0].matched_at <= matches[1].matched_at);
	}

	#[test]
	fn it_tracks_totals() {
		let (mut coordinator, clock) = coordinator(deferred(2));

		enqueue(&mut coordinator, &clock, "a", 100).unwrap();
		expect_match(enqueue(&mut coordinator, &clock, "b", 100));
		enqueue(&mut coordinator, &clock, "c", 100).unwrap();

		enqueue(&mut coordinator, &clock, "", 100).unwrap_err();
		enqueue(&mut coordinator, &clock, "c", 100).unwrap_err();

		let status = coordinator.status();

		assert_eq!(status.queue_size(), 1);
		assert_eq!(status.total_enqueued(), 3);
		assert_eq!(status.total_matched(), 1);
		assert_eq!(status.total_rejected(), 2);
	}
}

