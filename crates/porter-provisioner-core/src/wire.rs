// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Field layout of operation stream entries.
//!
//! State stream entries carry `id` (the workspace id) and `data` (JSON of a
//! [`StateUpdate`] or the completion marker). Logs stream entries carry a single
//! `log` field holding the formatted line.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::entry::{Fields, StreamEntry};
use crate::identity::WorkspaceId;
use crate::record::{LogLine, StateEvent, StateUpdate};

pub const FIELD_ID: &str = "id";
pub const FIELD_DATA: &str = "data";
pub const FIELD_LOG: &str = "log";

/// Status value of the completion marker.
pub const OPERATION_COMPLETED: &str = "OPERATION_COMPLETED";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum CompletionStatus {
	#[serde(rename = "OPERATION_COMPLETED")]
	OperationCompleted,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompletionMarker {
	status: CompletionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatePayload {
	Completed(CompletionMarker),
	Update(StateUpdate),
}

/// Why a single entry could not be decoded. Never fatal to a tail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeSkip {
	#[error("entry has no '{0}' field")]
	MissingField(&'static str),

	#[error("field '{0}' is not valid UTF-8")]
	InvalidUtf8(&'static str),

	#[error("malformed payload: {0}")]
	Malformed(String),
}

pub fn encode_state_update(
	workspace_id: &WorkspaceId,
	update: &StateUpdate,
) -> Result<Fields, serde_json::Error> {
	let data = serde_json::to_vec(update)?;
	Ok(state_fields(workspace_id, data))
}

pub fn encode_completed(workspace_id: &WorkspaceId) -> Result<Fields, serde_json::Error> {
	let data = serde_json::to_vec(&CompletionMarker {
		status: CompletionStatus::OperationCompleted,
	})?;
	Ok(state_fields(workspace_id, data))
}

pub fn encode_log_line(line: &LogLine) -> Fields {
	let mut fields = Fields::new();
	fields.insert(FIELD_LOG.to_string(), Bytes::from(line.format_line()));
	fields
}

fn state_fields(workspace_id: &WorkspaceId, data: Vec<u8>) -> Fields {
	let mut fields = Fields::new();
	fields.insert(
		FIELD_ID.to_string(),
		Bytes::copy_from_slice(workspace_id.as_str().as_bytes()),
	);
	fields.insert(FIELD_DATA.to_string(), Bytes::from(data));
	fields
}

pub fn decode_state_event(entry: &StreamEntry) -> Result<StateEvent, DecodeSkip> {
	let data = entry
		.field(FIELD_DATA)
		.ok_or(DecodeSkip::MissingField(FIELD_DATA))?;
	let payload: StatePayload =
		serde_json::from_slice(data).map_err(|e| DecodeSkip::Malformed(e.to_string()))?;
	Ok(match payload {
		StatePayload::Completed(_) => StateEvent::Completed,
		StatePayload::Update(update) => StateEvent::Update(update),
	})
}

pub fn decode_log_line(entry: &StreamEntry) -> Result<String, DecodeSkip> {
	let raw = entry
		.field(FIELD_LOG)
		.ok_or(DecodeSkip::MissingField(FIELD_LOG))?;
	std::str::from_utf8(raw)
		.map(str::to_owned)
		.map_err(|_| DecodeSkip::InvalidUtf8(FIELD_LOG))
}
