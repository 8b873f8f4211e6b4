// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-process stream store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use porter_provisioner_core::{EntryId, Fields, StreamEntry};
use tokio::sync::watch;

use super::{now_millis, ReadOptions, StreamStore};
use crate::error::StoreError;

/// A [`StreamStore`] that keeps every stream in memory.
///
/// Each stream has its own `watch` counter, bumped on every append, so a
/// blocked reader only wakes for the stream it follows.
#[derive(Clone)]
pub struct MemoryStreamStore {
	inner: Arc<MemoryStoreInner>,
}

struct MemoryStoreInner {
	streams: RwLock<HashMap<String, StreamSlot>>,
}

struct StreamSlot {
	entries: Vec<StreamEntry>,
	/// Append counter; readers subscribe before checking for entries.
	appended: watch::Sender<u64>,
}

impl StreamSlot {
	fn new() -> Self {
		let (appended, _) = watch::channel(0);
		Self {
			entries: Vec::new(),
			appended,
		}
	}
}

impl MemoryStreamStore {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(MemoryStoreInner {
				streams: RwLock::new(HashMap::new()),
			}),
		}
	}

	/// Subscribe to appends on `stream`, creating its slot if nothing was written yet.
	fn subscribe(&self, stream: &str) -> watch::Receiver<u64> {
		if let Some(slot) = self.inner.streams.read().get(stream) {
			return slot.appended.subscribe();
		}
		self
			.inner
			.streams
			.write()
			.entry(stream.to_string())
			.or_insert_with(StreamSlot::new)
			.appended
			.subscribe()
	}

	fn collect(&self, stream: &str, after: EntryId, count: Option<usize>) -> Vec<StreamEntry> {
		let streams = self.inner.streams.read();
		let Some(entries) = streams.get(stream).map(|slot| &slot.entries) else {
			return Vec::new();
		};
		let start = entries.partition_point(|e| e.id <= after);
		let end = match count {
			Some(n) => entries.len().min(start.saturating_add(n)),
			None => entries.len(),
		};
		entries[start..end].to_vec()
	}
}

impl Default for MemoryStreamStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StreamStore for MemoryStreamStore {
	async fn append(&self, stream: &str, fields: Fields) -> Result<EntryId, StoreError> {
		let id = {
			let mut streams = self.inner.streams.write();
			let slot = streams
				.entry(stream.to_string())
				.or_insert_with(StreamSlot::new);
			let id = EntryId::next_after(slot.entries.last().map(|e| e.id), now_millis());
			slot.entries.push(StreamEntry::new(id, fields));
			slot.appended.send_modify(|n| *n = n.wrapping_add(1));
			id
		};

		tracing::trace!(stream, entry_id = %id, "appended entry");
		Ok(id)
	}

	async fn read_since(
		&self,
		stream: &str,
		after: EntryId,
		options: ReadOptions,
	) -> Result<Vec<StreamEntry>, StoreError> {
		if !options.block {
			return Ok(self.collect(stream, after, options.count));
		}
		loop {
			let mut rx = self.subscribe(stream);
			let batch = self.collect(stream, after, options.count);
			if !batch.is_empty() {
				return Ok(batch);
			}
			if rx.changed().await.is_err() {
				return Ok(Vec::new());
			}
		}
	}

	async fn len(&self, stream: &str) -> Result<u64, StoreError> {
		Ok(
			self
				.inner
				.streams
				.read()
				.get(stream)
				.map_or(0, |slot| slot.entries.len() as u64),
		)
	}
}
