// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Consumer side: following a stream from an offset.
//!
//! A tail loops `blocked on read -> decoding batch -> blocked on read` until the
//! cancellation token fires (clean exit) or the store or sink fails (error
//! exit). Delivery is at-least-once per batch: a caller that persists the last
//! delivered [`EntryId`] and restarts from it sees the same records again.
//!
//! Entries that fail to decode are logged and skipped rather than ending the
//! tail, so one bad payload cannot stall every watcher of an operation.

use std::future::Future;

use porter_provisioner_core::{wire, DecodeSkip, EntryId, StateEvent, StreamEntry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SinkError, StreamError};
use crate::producer::OperationHandle;
use crate::store::{ReadOptions, StreamStore};

/// Where a tail starts and how much it reads at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailOptions {
	/// Deliver entries strictly after this id. [`EntryId::ZERO`] replays the whole stream.
	pub start: EntryId,
	pub batch_size: Option<usize>,
}

impl TailOptions {
	pub fn after(start: EntryId) -> Self {
		Self {
			start,
			..Self::default()
		}
	}
}

/// A decoded record together with the id of the entry it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery<T> {
	pub id: EntryId,
	pub record: T,
}

/// Follow `stream` from `options.start`, decoding each entry and handing it to `sink`.
///
/// Returns `Ok(())` once `cancel` fires, either while blocked on a read or at
/// the next batch boundary. Returns `Err` on the first store or sink failure.
pub async fn tail<T, D, S, Fut>(
	store: &dyn StreamStore,
	stream: &str,
	options: TailOptions,
	cancel: &CancellationToken,
	decode: D,
	mut sink: S,
) -> Result<()>
where
	D: Fn(&StreamEntry) -> std::result::Result<T, DecodeSkip>,
	S: FnMut(Delivery<T>) -> Fut,
	Fut: Future<Output = std::result::Result<(), SinkError>>,
{
	let mut offset = options.start;
	let read = ReadOptions::blocking(options.batch_size);
	debug!(stream, %offset, "starting tail");

	loop {
		let batch = tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				debug!(stream, %offset, "tail cancelled while blocked on read");
				return Ok(());
			}
			batch = store.read_since(stream, offset, read) => batch?,
		};

		if let Some(last) = batch.last() {
			offset = last.id;
		}

		for entry in &batch {
			match decode(entry) {
				Ok(record) => {
					sink(Delivery {
						id: entry.id,
						record,
					})
					.await
					.map_err(|source| StreamError::Sink {
						id: entry.id,
						source,
					})?;
				}
				Err(skip) => {
					warn!(stream, entry_id = %entry.id, reason = %skip, "skipping undecodable stream entry");
				}
			}
		}

		if cancel.is_cancelled() {
			debug!(stream, %offset, "tail cancelled after batch");
			return Ok(());
		}
	}
}

impl OperationHandle {
	fn tail_options(&self, options: TailOptions) -> TailOptions {
		TailOptions {
			batch_size: options.batch_size.or(self.read_batch_size),
			..options
		}
	}

	/// Tail the state stream, delivering updates and the completion marker.
	#[tracing::instrument(
		skip(self, cancel, sink),
		fields(workspace_id = %self.streams.workspace_id(), start = %options.start)
	)]
	pub async fn stream_state_updates<S, Fut>(
		&self,
		options: TailOptions,
		cancel: &CancellationToken,
		sink: S,
	) -> Result<()>
	where
		S: FnMut(Delivery<StateEvent>) -> Fut,
		Fut: Future<Output = std::result::Result<(), SinkError>>,
	{
		tail(
			self.store.as_ref(),
			&self.streams.state_stream(),
			self.tail_options(options),
			cancel,
			wire::decode_state_event,
			sink,
		)
		.await
	}

	/// Tail the logs stream, delivering formatted log lines.
	#[tracing::instrument(
		skip(self, cancel, sink),
		fields(workspace_id = %self.streams.workspace_id(), start = %options.start)
	)]
	pub async fn stream_log_lines<S, Fut>(
		&self,
		options: TailOptions,
		cancel: &CancellationToken,
		sink: S,
	) -> Result<()>
	where
		S: FnMut(Delivery<String>) -> Fut,
		Fut: Future<Output = std::result::Result<(), SinkError>>,
	{
		tail(
			self.store.as_ref(),
			&self.streams.logs_stream(),
			self.tail_options(options),
			cancel,
			wire::decode_log_line,
			sink,
		)
		.await
	}
}
