/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::{
	collections::HashMap,
	sync::Arc,
	time::Duration,
};

use crate::{
	Handle,
	Timestamp,
	entry::{Entry, Match},
	policy::{
		AttemptContext,
		DeltaCap,
		MatchMode,
		MatchPolicy,
		PolicyContext,
		RetryInstruction,
		Timeout,
		TimeoutOutcome,
	},
};

const DEFAULT_MIN_QUEUE: usize = 20;
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);
const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Configuration for [`DeferredCappedPolicy`].
#[derive(Clone, Debug)]
pub struct DeferredCappedConfig {
	/// Queue size at which enqueues attempt a match immediately.
	pub min_queue: usize,

	/// Longest a request may stay deferred before the timer retries it.
	/// `None` disables wait-based retries.
	pub max_wait: Option<Duration>,

	/// Timer cadence. A zero duration normalizes to one second; `None`
	/// disables the timer.
	pub tick: Option<Duration>,

	/// Delta cap for immediate attempts.
	pub initial_delta: DeltaCap,

	/// Delta cap for attempts made after a request exceeded `max_wait`.
	pub relaxed_delta: DeltaCap,
}

impl Default for DeferredCappedConfig {
	fn default() -> Self {
		DeferredCappedConfig {
			min_queue: DEFAULT_MIN_QUEUE,
			max_wait: Some(DEFAULT_MAX_WAIT),
			tick: Some(DEFAULT_TICK),
			initial_delta: DeltaCap::Unbounded,
			relaxed_delta: DeltaCap::Unbounded,
		}
	}
}

struct Waiting {
	user_id: Arc<str>,
	inserted_at: Timestamp,
}

/// The reference policy: attempt immediately once the queue is busy enough,
/// otherwise defer and let the timer retry entries that have waited past
/// `max_wait` under the relaxed delta cap.
pub struct DeferredCappedPolicy {
	config: DeferredCappedConfig,
	waiting: HashMap<Handle, Waiting>,
}

impl DeferredCappedPolicy {
	#[must_use]
	pub fn new(mut config: DeferredCappedConfig) -> Self {
		if let Some(tick) = config.tick {
			if tick.is_zero() {
				config.tick = Some(DEFAULT_TICK);
			}
		}

		DeferredCappedPolicy {
			config,
			waiting: HashMap::new(),
		}
	}

	fn is_due(&self, inserted_at: Timestamp, now: Timestamp) -> bool {
		match self.config.max_wait {
			Some(max_wait) => {
				now.saturating_sub(inserted_at) >= max_wait.as_millis() as Timestamp
			},

			None => false,
		}
	}
}

impl Default for DeferredCappedPolicy {
	fn default() -> Self {
		DeferredCappedPolicy::new(DeferredCappedConfig::default())
	}
}

impl MatchPolicy for DeferredCappedPolicy {
	fn initial_timeout(&self) -> Timeout {
		self.config.tick
	}

	fn matchmaking_mode(&mut self, entry: &Entry, ctx: &PolicyContext) -> MatchMode {
		if ctx.queue_size >= self.config.min_queue {
			return MatchMode::Attempt(AttemptContext::immediate());
		}

		if self.is_due(entry.inserted_at, ctx.now) {
			let waited = ctx.now.saturating_sub(entry.inserted_at);
			return MatchMode::Attempt(AttemptContext::after_wait(waited));
		}

		self.waiting.insert(entry.handle, Waiting {
			user_id: entry.user_id.clone(),
			inserted_at: entry.inserted_at,
		});

		MatchMode::Defer
	}

	fn max_delta(&mut self, _entry: &Entry, _ctx: &PolicyContext, attempt: &AttemptContext) -> DeltaCap {
		match self.config.initial_delta {
			DeltaCap::Unbounded => DeltaCap::Unbounded,

			DeltaCap::Bounded(initial) => match attempt.relaxed {
				true => self.config.relaxed_delta,
				false => DeltaCap::Bounded(initial),
			},
		}
	}

	fn after_match(&mut self, matched: &Match, _ctx: &PolicyContext) {
		for user in &matched.users {
			self.waiting.remove(&user.handle);
		}
	}

	fn handle_timeout(&mut self, ctx: &PolicyContext) -> TimeoutOutcome {
		let mut due = self.waiting
			.iter()
			.filter(|(_, waiting)| self.is_due(waiting.inserted_at, ctx.now))
			.map(|(handle, waiting)| (*handle, waiting.inserted_at, waiting.user_id.clone()))
			.collect::<Vec<(Handle, Timestamp, Arc<str>)>>();

		// retries run in arrival order so tick outcomes are reproducible
		due.sort_by(|a, b| (a.1, &a.2).cmp(&(b.1, &b.2)));

		let retries = due
			.into_iter()
			.map(|(handle, inserted_at, _)| RetryInstruction {
				handle,
				attempt: AttemptContext::after_wait(ctx.now.saturating_sub(inserted_at)),
			})
			.collect::<Vec<RetryInstruction>>();

		TimeoutOutcome {
			retries,
			next_tick: self.config.tick,
		}
	}

	fn terminate(&mut self) {
		self.waiting.clear();
	}
}
