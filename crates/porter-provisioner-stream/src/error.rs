// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use porter_provisioner_core::EntryId;

/// Failure reported by a caller-supplied sink.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a [`StreamStore`](crate::StreamStore) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("Entry id out of range: {0}")]
	InvalidEntryId(String),

	#[error("Internal: {0}")]
	Internal(String),
}

/// Errors surfaced by producers and tails.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
	/// A record could not be encoded for the store.
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The store rejected an append or a read.
	#[error("Transport error: {0}")]
	Transport(#[from] StoreError),

	/// The sink failed to accept a delivered record; the tail stops at `id`.
	#[error("Sink failed at entry {id}: {source}")]
	Sink {
		id: EntryId,
		#[source]
		source: SinkError,
	},
}

pub type Result<T> = std::result::Result<T, StreamError>;
