/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::VecDeque;

use crate::entry::Match;

/// Bounded, most-recent-first record of completed matches. Off the matching
/// hot path; introspection only.
pub(crate) struct MatchHistory {
	matches: VecDeque<Match>,
	cap: usize,
}

impl MatchHistory {
	pub fn new(cap: usize) -> Self {
		MatchHistory {
			matches: VecDeque::new(),
			cap,
		}
	}

	pub fn push(&mut self, matched: Match) {
		if self.cap == 0 {
			return;
		}

		self.matches.push_front(matched);
		self.matches.truncate(self.cap);
	}

	/// The `limit` most recent matches, oldest of those first.
	pub fn recent(&self, limit: usize) -> Vec<Match> {
		let mut recent = self.matches
			.iter()
			.take(limit)
			.cloned()
			.collect::<Vec<Match>>();

		recent.reverse();
		recent
	}
}
