/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod hub;

use serde::Serialize;
use thiserror::Error;

use crate::{Rank, entry::Match};

#[derive(Debug, PartialEq, Eq, Error)]
pub enum PublishError {
	#[error("the match could not be delivered: {0}")]
	Delivery(String),
}

/// Topic a user's match notifications are published on.
#[must_use]
pub fn topic_for(user_id: &str) -> String {
	format!("match_found:{user_id}")
}

/// Wire shape of one matched user; field names follow the external surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedUser {
	pub user_id: String,
	pub user_rank: Rank,
}

/// Payload delivered to each matched user's topic. User order matches the
/// match record: triggering entry first, candidate second.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatchPayload {
	pub users: Vec<MatchedUser>,
}

impl From<&Match> for MatchPayload {
	fn from(matched: &Match) -> Self {
		let users = matched.users
			.iter()
			.map(|user| MatchedUser {
				user_id: user.user_id.to_string(),
				user_rank: user.rank,
			})
			.collect::<Vec<MatchedUser>>();

		MatchPayload {
			users,
		}
	}
}

/// Delivery seam between the queue core and the subscription fabric.
/// Implementations must be best-effort: a failed delivery is reported, never
/// propagated, and must leave the publisher usable.
pub trait Publisher
where
	Self: Send + Sync,
{
	fn publish(&self, matched: &Match) -> Result<(), PublishError>;
}

pub use crate::publisher::hub::SubscriptionHub;
