/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod mem_store;

use std::{collections::BTreeMap, sync::Arc};

use thiserror::Error;

use crate::{
	Handle,
	Rank,
	entry::{Entry, QueueRequest},
};

#[derive(Debug, PartialEq, Eq, Error)]
pub enum StoreError {
	#[error("a request for this user is already queued")]
	Duplicate,

	#[error("the handle was not found in the queue")]
	NotFound,
}

/// A read-only projection of the store at a moment in time. Buckets and the
/// arrival sequence hold entries in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
	pub buckets: BTreeMap<Rank, Vec<Arc<Entry>>>,
	pub arrival: Vec<Arc<Entry>>,
	pub len: usize,
}

/// Holds the live entry set. Implementations report duplicates and missing
/// handles as tagged outcomes; they never panic on them.
pub trait QueueStore
where
	Self: Send,
{
	/// Assigns a fresh handle and stores the request. Fails with
	/// [`StoreError::Duplicate`] if the user already has a live entry.
	fn insert(&mut self, request: QueueRequest) -> Result<Arc<Entry>, StoreError>;

	fn remove(&mut self, handle: Handle) -> Result<Arc<Entry>, StoreError>;
	fn lookup(&self, handle: Handle) -> Option<Arc<Entry>>;

	fn snapshot(&self) -> Snapshot;

	fn head(&self) -> Option<Arc<Entry>>;
	fn pop_head(&mut self) -> Option<Arc<Entry>>;

	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Removes every entry the predicate selects, returning them in removal
	/// order.
	fn prune(&mut self, predicate: &dyn Fn(&Entry) -> bool) -> Vec<Arc<Entry>>;
}

pub use crate::store::mem_store::MemStore;
