// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The append-log boundary operation streams are built on.

mod memory;
mod sqlite;

pub use memory::MemoryStreamStore;
pub use sqlite::{create_pool, run_migrations, SqliteStreamStore};

use async_trait::async_trait;
use porter_provisioner_core::{EntryId, Fields, StreamEntry};

use crate::error::StoreError;

/// How a read should behave when no entries are available yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
	/// Upper bound on entries returned in one batch.
	pub count: Option<usize>,
	/// Suspend until at least one entry is available.
	pub block: bool,
}

impl ReadOptions {
	pub fn blocking(count: Option<usize>) -> Self {
		Self { count, block: true }
	}

	pub fn poll(count: Option<usize>) -> Self {
		Self {
			count,
			block: false,
		}
	}
}

/// A shared, persistent, multi-writer append log of named streams.
///
/// Implementations serialize concurrent appends to the same stream and assign
/// strictly increasing [`EntryId`]s. Streams are created on first append.
#[async_trait]
pub trait StreamStore: Send + Sync {
	/// Append an entry to `stream`, returning the id assigned to it.
	async fn append(&self, stream: &str, fields: Fields) -> Result<EntryId, StoreError>;

	/// Entries of `stream` with ids strictly greater than `after`, in append order.
	///
	/// With [`ReadOptions::block`] set this suspends until at least one entry is
	/// available. An implementation may still return an empty batch on a
	/// spurious wakeup; callers loop.
	async fn read_since(
		&self,
		stream: &str,
		after: EntryId,
		options: ReadOptions,
	) -> Result<Vec<StreamEntry>, StoreError>;

	/// Number of entries currently in `stream`.
	async fn len(&self, stream: &str) -> Result<u64, StoreError>;
}

pub(crate) fn now_millis() -> u64 {
	u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
