/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::Arc;

use log::debug;

use crate::{
	Rank,
	entry::{Entry, Match},
	error::QueueError,
	policy::{AttemptContext, DeltaCap, MatchPolicy, PolicyContext},
	store::{QueueStore, Snapshot},
};

/// Picks the opponent for `entry` from a snapshot: expand the rank delta
/// from 0 upward and stop at the first band holding any candidate; within a
/// band the entry minimizing `(inserted_at, user_id)` wins. Deterministic
/// for a given snapshot.
pub(crate) fn select_candidate(
	snapshot: &Snapshot,
	entry: &Entry,
	cap: DeltaCap,
) -> Option<Arc<Entry>> {
	// only deltas with an occupied bucket can yield a candidate, so the
	// 0, 1, 2, ... expansion collapses to the sorted distinct deltas present
	let mut deltas = snapshot.buckets
		.keys()
		.map(|rank| rank.abs_diff(entry.rank))
		.filter(|delta| match cap {
			DeltaCap::Unbounded => true,
			DeltaCap::Bounded(limit) => *delta <= limit,
		})
		.collect::<Vec<Rank>>();

	deltas.sort_unstable();
	deltas.dedup();

	for delta in deltas {
		let candidate = band(snapshot, entry, delta)
			.min_by_key(|candidate| (candidate.inserted_at, candidate.user_id.clone()));

		if candidate.is_some() {
			return candidate;
		}
	}

	None
}

/// All entries exactly `delta` ranks away from `entry`, excluding `entry`
/// itself.
fn band<'a>(
	snapshot: &'a Snapshot,
	entry: &'a Entry,
	delta: Rank,
) -> impl Iterator<Item = Arc<Entry>> + 'a {
	let lower = match delta {
		0 => None,
		_ => entry.rank.checked_sub(delta),
	};

	let upper = entry.rank.checked_add(delta);

	lower
		.into_iter()
		.chain(upper)
		.filter_map(|rank| snapshot.buckets.get(&rank))
		.flatten()
		.filter(move |candidate| candidate.handle != entry.handle)
		.cloned()
}

/// Runs one matching attempt for `entry`: asks the policy for the delta
/// cap, scans a fresh snapshot, and on a win removes both entries, builds
/// the match record, and lets the policy update its bookkeeping.
pub(crate) fn attempt_match(
	store: &mut dyn QueueStore,
	policy: &mut dyn MatchPolicy,
	entry: &Arc<Entry>,
	attempt: AttemptContext,
	ctx: &PolicyContext,
) -> Result<Option<Match>, QueueError> {
	let cap = policy.max_delta(entry, ctx, &attempt);
	let snapshot = store.snapshot();

	let Some(candidate) = select_candidate(&snapshot, entry, cap) else {
		debug!("No candidate within the delta cap for {}", entry.user_id);
		return Ok(None);
	};

	store.remove(candidate.handle)
		.map_err(|err| QueueError::Queue(err.to_string()))?;

	store.remove(entry.handle)
		.map_err(|err| QueueError::Queue(err.to_string()))?;

	let delta = entry.rank.abs_diff(candidate.rank);

	let matched = Match {
		users: [entry.clone(), candidate],
		delta,
		matched_at: ctx.now,
		context: attempt,
	};

	policy.after_match(&matched, ctx);

	Ok(Some(matched))
}
