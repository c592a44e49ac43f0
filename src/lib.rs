/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod error;
mod entry;
mod history;
mod matcher;
mod coordinator;
mod match_queue;
mod status;
mod worker;

pub mod store;
pub mod policy;
pub mod publisher;

pub use crate::coordinator::EnqueueOutcome;
pub use crate::entry::{Entry, Match, Meta, QueueRequest};
pub use crate::error::QueueError;
pub use crate::match_queue::{DEFAULT_MAX_MATCH_HISTORY, MatchQueue, MatchQueueConfig};
pub use crate::status::QueueStatus;

use std::{sync::Arc, time::Instant};

use nohash_hasher::BuildNoHashHasher;

pub type Rank = u64;
pub type Timestamp = u64;
pub type Handle = u64;

/// The coordinator reads time exclusively through this function. It must be
/// monotonic and millisecond-valued; tests inject counters or settable clocks.
pub type TimeFn = Arc<dyn Fn() -> Timestamp + Send + Sync>;

pub(crate) type NoHasher = BuildNoHashHasher<Handle>;

/// A monotonic millisecond clock anchored at the moment it was created.
#[must_use]
pub fn monotonic_time_fn() -> TimeFn {
	let start = Instant::now();
	Arc::new(move || start.elapsed().as_millis() as Timestamp)
}
