/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use kwik::time;

/// Point-in-time view of a running queue.
#[derive(Clone, Debug)]
pub struct QueueStatus {
	queue_size: usize,

	total_enqueued: u64,
	total_matched: u64,
	total_rejected: u64,

	start_time: u64,
}

impl QueueStatus {
	pub(crate) fn new(
		queue_size: usize,
		total_enqueued: u64,
		total_matched: u64,
		total_rejected: u64,
		start_time: u64,
	) -> Self {
		QueueStatus {
			queue_size,

			total_enqueued,
			total_matched,
			total_rejected,

			start_time,
		}
	}

	/// Returns the number of live queued requests.
	#[must_use]
	pub fn queue_size(&self) -> usize {
		self.queue_size
	}

	/// Returns the total number of accepted enqueues.
	#[must_use]
	pub fn total_enqueued(&self) -> u64 {
		self.total_enqueued
	}

	/// Returns the total number of completed matches.
	#[must_use]
	pub fn total_matched(&self) -> u64 {
		self.total_matched
	}

	/// Returns the total number of rejected enqueues.
	#[must_use]
	pub fn total_rejected(&self) -> u64 {
		self.total_rejected
	}

	/// Returns the queue's current uptime.
	#[must_use]
	pub fn uptime(&self) -> u64 {
		time::timestamp() - self.start_time
	}
}
