/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::{
	entry::Entry,
	policy::{AttemptContext, MatchMode, MatchPolicy, PolicyContext},
};

/// Attempts a match on every enqueue with no delta cap and no timer.
#[derive(Default)]
pub struct ImmediatePolicy;

impl MatchPolicy for ImmediatePolicy {
	fn matchmaking_mode(&mut self, _entry: &Entry, _ctx: &PolicyContext) -> MatchMode {
		MatchMode::Attempt(AttemptContext::immediate())
	}
}
