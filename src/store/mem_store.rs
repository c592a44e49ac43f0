/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
};

use dlv_list::{Index, VecList};

use crate::{
	Handle,
	NoHasher,
	Rank,
	entry::{Entry, QueueRequest},
	store::{QueueStore, Snapshot, StoreError},
};

struct StoredEntry {
	entry: Arc<Entry>,
	arrival_index: Index<Handle>,
	bucket_index: Index<Handle>,
}

/// The reference in-memory store: a handle-keyed entry map plus two ordered
/// indexes (per-rank FIFO buckets and the global arrival list). Insert,
/// remove, lookup, head, and pop_head are O(1) amortized; snapshot and prune
/// are O(n).
pub struct MemStore {
	entries: HashMap<Handle, StoredEntry, NoHasher>,
	users: HashMap<Arc<str>, Handle>,
	buckets: HashMap<Rank, VecList<Handle>>,
	arrival: VecList<Handle>,

	next_handle: Handle,
}

impl MemStore {
	#[must_use]
	pub fn new() -> Self {
		MemStore {
			entries: HashMap::default(),
			users: HashMap::new(),
			buckets: HashMap::new(),
			arrival: VecList::new(),

			next_handle: 0,
		}
	}
}

impl Default for MemStore {
	fn default() -> Self {
		MemStore::new()
	}
}

impl QueueStore for MemStore {
	fn insert(&mut self, request: QueueRequest) -> Result<Arc<Entry>, StoreError> {
		if self.users.contains_key(&request.user_id) {
			return Err(StoreError::Duplicate);
		}

		// handles are never reused within a process lifetime
		let handle = self.next_handle;
		self.next_handle += 1;

		let entry = Arc::new(request.into_entry(handle));

		let arrival_index = self.arrival.push_back(handle);

		let bucket_index = self.buckets
			.entry(entry.rank)
			.or_insert_with(VecList::new)
			.push_back(handle);

		self.users.insert(entry.user_id.clone(), handle);

		self.entries.insert(handle, StoredEntry {
			entry: entry.clone(),
			arrival_index,
			bucket_index,
		});

		Ok(entry)
	}

	fn remove(&mut self, handle: Handle) -> Result<Arc<Entry>, StoreError> {
		let Some(stored) = self.entries.remove(&handle) else {
			return Err(StoreError::NotFound);
		};

		self.arrival.remove(stored.arrival_index);

		if let Some(bucket) = self.buckets.get_mut(&stored.entry.rank) {
			bucket.remove(stored.bucket_index);

			if bucket.is_empty() {
				self.buckets.remove(&stored.entry.rank);
			}
		}

		self.users.remove(&stored.entry.user_id);

		Ok(stored.entry)
	}

	fn lookup(&self, handle: Handle) -> Option<Arc<Entry>> {
		self.entries
			.get(&handle)
			.map(|stored| stored.entry.clone())
	}

	fn snapshot(&self) -> Snapshot {
		let mut buckets = BTreeMap::<Rank, Vec<Arc<Entry>>>::new();
		let mut arrival = Vec::with_capacity(self.entries.len());

		for handle in self.arrival.iter() {
			let Some(stored) = self.entries.get(handle) else {
				continue;
			};

			buckets
				.entry(stored.entry.rank)
				.or_default()
				.push(stored.entry.clone());

			arrival.push(stored.entry.clone());
		}

		Snapshot {
			buckets,
			arrival,
			len: self.entries.len(),
		}
	}

	fn head(&self) -> Option<Arc<Entry>> {
		let handle = self.arrival.front()?;
		self.lookup(*handle)
	}

	fn pop_head(&mut self) -> Option<Arc<Entry>> {
		let handle = *self.arrival.front()?;
		self.remove(handle).ok()
	}

	fn len(&self) -> usize {
		self.entries.len()
	}

	fn prune(&mut self, predicate: &dyn Fn(&Entry) -> bool) -> Vec<Arc<Entry>> {
		let doomed = self.arrival
			.iter()
			.filter_map(|handle| self.entries.get(handle))
			.filter(|stored| predicate(&stored.entry))
			.map(|stored| stored.entry.handle)
			.collect::<Vec<Handle>>();

		doomed
			.into_iter()
			.filter_map(|handle| self.remove(handle).ok())
			.collect()
	}
}
