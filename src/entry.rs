/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::{collections::HashMap, sync::Arc};

use crate::{
	Handle,
	Rank,
	Timestamp,
	policy::AttemptContext,
};

/// Free-form attributes carried by a request. The core never interprets
/// them; policies may.
pub type Meta = HashMap<String, String>;

/// A live queued request. Immutable once inserted; identified by its handle
/// for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
	pub user_id: Arc<str>,
	pub rank: Rank,
	pub inserted_at: Timestamp,
	pub handle: Handle,
	pub meta: Meta,
}

/// The shape of a request before the store has assigned it a handle.
#[derive(Clone, Debug)]
pub struct QueueRequest {
	pub user_id: Arc<str>,
	pub rank: Rank,
	pub inserted_at: Timestamp,
	pub meta: Meta,
}

impl QueueRequest {
	pub(crate) fn into_entry(self, handle: Handle) -> Entry {
		Entry {
			user_id: self.user_id,
			rank: self.rank,
			inserted_at: self.inserted_at,
			handle,
			meta: self.meta,
		}
	}
}

/// The result of pairing two entries. `users[0]` is the entry whose arrival
/// or retry triggered the attempt; `users[1]` is the selected candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
	pub users: [Arc<Entry>; 2],
	pub delta: Rank,
	pub matched_at: Timestamp,
	pub context: AttemptContext,
}

impl Match {
	#[must_use]
	pub fn entry(&self) -> &Arc<Entry> {
		&self.users[0]
	}

	#[must_use]
	pub fn candidate(&self) -> &Arc<Entry> {
		&self.users[1]
	}
}
