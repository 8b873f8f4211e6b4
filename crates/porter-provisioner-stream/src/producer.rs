// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Producer side: appending typed records to an operation's streams.

use std::sync::Arc;

use chrono::Utc;
use porter_provisioner_core::{
	wire, EntryId, InfraRecord, LogLine, OperationRecord, OperationStreams, ResourceState,
	StateUpdate, WorkspaceId,
};

use crate::error::Result;
use crate::store::StreamStore;

/// Entry point to the operation streams held in a [`StreamStore`].
#[derive(Clone)]
pub struct ProvisionerStreams {
	store: Arc<dyn StreamStore>,
	read_batch_size: Option<usize>,
}

impl ProvisionerStreams {
	pub fn new(store: Arc<dyn StreamStore>) -> Self {
		Self {
			store,
			read_batch_size: None,
		}
	}

	/// Cap the number of entries a tail reads per batch.
	pub fn with_read_batch_size(mut self, read_batch_size: usize) -> Self {
		self.read_batch_size = Some(read_batch_size);
		self
	}

	pub fn store(&self) -> &Arc<dyn StreamStore> {
		&self.store
	}

	pub fn operation(&self, infra: &InfraRecord, operation: &OperationRecord) -> OperationHandle {
		self.streams(OperationStreams::for_operation(infra, operation))
	}

	pub fn workspace(&self, workspace_id: WorkspaceId) -> OperationHandle {
		self.streams(OperationStreams::new(workspace_id))
	}

	fn streams(&self, streams: OperationStreams) -> OperationHandle {
		OperationHandle {
			store: Arc::clone(&self.store),
			streams,
			read_batch_size: self.read_batch_size,
		}
	}
}

/// The state and logs streams of one operation.
///
/// Appends are point operations with no retry; failures are returned as-is.
#[derive(Clone)]
pub struct OperationHandle {
	pub(crate) store: Arc<dyn StreamStore>,
	pub(crate) streams: OperationStreams,
	pub(crate) read_batch_size: Option<usize>,
}

impl OperationHandle {
	pub fn streams(&self) -> &OperationStreams {
		&self.streams
	}

	pub fn workspace_id(&self) -> &WorkspaceId {
		self.streams.workspace_id()
	}

	/// Stamp `resource` with the current time and append it to the state stream.
	#[tracing::instrument(
		skip(self, resource),
		fields(workspace_id = %self.streams.workspace_id(), resource_id = %resource.resource_id)
	)]
	pub async fn push_state_update(&self, resource: ResourceState) -> Result<EntryId> {
		let update = StateUpdate::new(resource, Utc::now());
		let fields = wire::encode_state_update(self.streams.workspace_id(), &update)?;
		let id = self
			.store
			.append(&self.streams.state_stream(), fields)
			.await?;
		tracing::debug!(entry_id = %id, "pushed state update");
		Ok(id)
	}

	/// Format `line` and append it to the logs stream.
	#[tracing::instrument(skip(self, line), fields(workspace_id = %self.streams.workspace_id()))]
	pub async fn push_log_line(&self, line: &LogLine) -> Result<EntryId> {
		let id = self
			.store
			.append(&self.streams.logs_stream(), wire::encode_log_line(line))
			.await?;
		tracing::trace!(entry_id = %id, "pushed log line");
		Ok(id)
	}

	/// Append the completion marker to the state stream.
	///
	/// The marker shares the state stream's ordering, so no consumer sees it
	/// before an update pushed earlier.
	#[tracing::instrument(skip(self), fields(workspace_id = %self.streams.workspace_id()))]
	pub async fn signal_completed(&self) -> Result<EntryId> {
		let fields = wire::encode_completed(self.streams.workspace_id())?;
		let id = self
			.store
			.append(&self.streams.state_stream(), fields)
			.await?;
		tracing::info!(entry_id = %id, "operation completed");
		Ok(id)
	}
}
