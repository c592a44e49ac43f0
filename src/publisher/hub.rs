/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::DashMap;
use log::debug;

use crate::{
	entry::Match,
	publisher::{MatchPayload, PublishError, Publisher, topic_for},
};

/// The reference delivery fabric: a per-topic registry of channel senders.
/// Safe for concurrent subscribe and publish; delivery is lossy by contract,
/// so a user with no live subscribers simply receives nothing.
#[derive(Default)]
pub struct SubscriptionHub {
	topics: DashMap<String, Vec<Sender<MatchPayload>>>,
}

impl SubscriptionHub {
	#[must_use]
	pub fn new() -> Self {
		SubscriptionHub {
			topics: DashMap::new(),
		}
	}

	/// Registers a subscriber for `user_id`'s future matches.
	pub fn subscribe(&self, user_id: &str) -> Receiver<MatchPayload> {
		let (sender, receiver) = unbounded();

		self.topics
			.entry(topic_for(user_id))
			.or_default()
			.push(sender);

		receiver
	}

	#[must_use]
	pub fn subscriber_count(&self, user_id: &str) -> usize {
		self.topics
			.get(&topic_for(user_id))
			.map_or(0, |senders| senders.len())
	}
}

impl Publisher for SubscriptionHub {
	fn publish(&self, matched: &Match) -> Result<(), PublishError> {
		let payload = MatchPayload::from(matched);

		for user in &matched.users {
			let topic = topic_for(&user.user_id);

			let Some(mut senders) = self.topics.get_mut(&topic) else {
				continue;
			};

			// disconnected subscribers are pruned on the way through
			let before = senders.len();
			senders.retain(|sender| sender.send(payload.clone()).is_ok());

			if senders.len() < before {
				debug!(
					"Pruned {} disconnected subscriber(s) from {topic}",
					before - senders.len(),
				);
			}
		}

		Ok(())
	}
}
