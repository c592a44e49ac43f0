/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod deferred_capped;
mod immediate;

use std::{fmt, time::Duration};

use crate::{
	Handle,
	Rank,
	Timestamp,
	entry::{Entry, Match, QueueRequest},
};

/// Delay until the next timer tick. `None` disables the timer.
pub type Timeout = Option<Duration>;

/// Manager-side context computed by the coordinator at every policy call.
#[derive(Clone, Copy, Debug)]
pub struct PolicyContext {
	pub queue_size: usize,
	pub now: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnqueueDecision {
	Proceed,
	Reject(RejectReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
	Duplicate,
	Cancelled,
	Custom(String),
}

impl fmt::Display for RejectReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RejectReason::Duplicate => write!(f, "duplicate"),
			RejectReason::Cancelled => write!(f, "cancelled"),
			RejectReason::Custom(reason) => write!(f, "{reason}"),
		}
	}
}

/// What to do with a just-inserted entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchMode {
	/// Run the matcher now, under the supplied attempt context.
	Attempt(AttemptContext),

	/// Leave the entry queued; the timer revisits it later.
	Defer,

	/// Remove the entry again and reject the enqueue.
	Cancel,
}

/// Context a policy attaches to an authorized attempt. Echoed back into
/// [`MatchPolicy::max_delta`] and recorded on the resulting [`Match`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttemptContext {
	/// Set on attempts made past the entry's wait threshold.
	pub relaxed: bool,

	/// How long the entry had waited when the attempt was authorized, in
	/// milliseconds.
	pub waited: Option<Timestamp>,
}

impl AttemptContext {
	#[must_use]
	pub fn immediate() -> Self {
		AttemptContext::default()
	}

	#[must_use]
	pub fn after_wait(waited: Timestamp) -> Self {
		AttemptContext {
			relaxed: true,
			waited: Some(waited),
		}
	}
}

/// Cap on the absolute rank difference the matcher may consider in one
/// attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaCap {
	Unbounded,
	Bounded(Rank),
}

/// Asks the coordinator to re-attempt matching for one specific handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryInstruction {
	pub handle: Handle,
	pub attempt: AttemptContext,
}

/// Result of a timer tick: retries to run now, and the delay until the next
/// tick.
#[derive(Debug, PartialEq, Eq)]
pub struct TimeoutOutcome {
	pub retries: Vec<RetryInstruction>,
	pub next_tick: Timeout,
}

/// Decides when a match is attempted, how far the rank scan may expand, and
/// how deferred entries are revisited. Policy state is the implementing
/// value itself; the coordinator only ever calls these hooks.
pub trait MatchPolicy
where
	Self: Send,
{
	/// Delay before the first timer tick.
	fn initial_timeout(&self) -> Timeout {
		None
	}

	fn before_enqueue(&mut self, _request: &QueueRequest, _ctx: &PolicyContext) -> EnqueueDecision {
		EnqueueDecision::Proceed
	}

	fn matchmaking_mode(&mut self, entry: &Entry, ctx: &PolicyContext) -> MatchMode;

	fn max_delta(&mut self, _entry: &Entry, _ctx: &PolicyContext, _attempt: &AttemptContext) -> DeltaCap {
		DeltaCap::Unbounded
	}

	/// Runs after the store has removed both matched entries and before the
	/// match is published.
	fn after_match(&mut self, _matched: &Match, _ctx: &PolicyContext) {}

	fn handle_timeout(&mut self, _ctx: &PolicyContext) -> TimeoutOutcome {
		TimeoutOutcome {
			retries: Vec::new(),
			next_tick: None,
		}
	}

	fn terminate(&mut self) {}
}

pub use crate::policy::{
	deferred_capped::{DeferredCappedConfig, DeferredCappedPolicy},
	immediate::ImmediatePolicy,
};
