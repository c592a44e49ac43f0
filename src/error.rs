/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum QueueError {
	#[error("the user id must be a non-empty string of at most 255 characters")]
	InvalidUserId,

	#[error("the rank must be a non-negative integer")]
	InvalidRank,

	#[error("invalid request parameters")]
	InvalidParams,

	#[error("a request for this user is already queued")]
	AlreadyEnqueued,

	#[error("policy rejected: {0}")]
	PolicyRejected(String),

	#[error("queue error: {0}")]
	Queue(String),
}
