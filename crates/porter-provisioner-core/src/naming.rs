// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Stream names belonging to one operation.

use crate::identity::{InfraRecord, OperationRecord, WorkspaceId};

const STATE_SUFFIX: &str = "-state";
const LOGS_SUFFIX: &str = "-logs";
const LOG_FILE_SUFFIX: &str = "-logs.txt";

/// The two logical streams (state updates and log lines) of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationStreams {
	workspace_id: WorkspaceId,
}

impl OperationStreams {
	pub fn new(workspace_id: WorkspaceId) -> Self {
		Self { workspace_id }
	}

	pub fn for_operation(infra: &InfraRecord, operation: &OperationRecord) -> Self {
		Self::new(WorkspaceId::derive(infra, operation))
	}

	pub fn workspace_id(&self) -> &WorkspaceId {
		&self.workspace_id
	}

	pub fn state_stream(&self) -> String {
		format!("{}{STATE_SUFFIX}", self.workspace_id)
	}

	pub fn logs_stream(&self) -> String {
		format!("{}{LOGS_SUFFIX}", self.workspace_id)
	}

	/// Name of the flat log file for this operation. Not used when tailing.
	pub fn log_file_name(&self) -> String {
		format!("{}{LOG_FILE_SUFFIX}", self.workspace_id)
	}
}
