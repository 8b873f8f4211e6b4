// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Typed records carried by operation streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one provisioned resource, as reported by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
	pub resource_id: String,
	pub state: serde_json::Value,
}

impl ResourceState {
	pub fn new(resource_id: impl Into<String>, state: serde_json::Value) -> Self {
		Self {
			resource_id: resource_id.into(),
			state,
		}
	}
}

/// A [`ResourceState`] stamped with the time it was pushed to the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
	pub resource_id: String,
	pub state: serde_json::Value,
	pub pushed_at: DateTime<Utc>,
}

impl StateUpdate {
	pub fn new(resource: ResourceState, pushed_at: DateTime<Utc>) -> Self {
		Self {
			resource_id: resource.resource_id,
			state: resource.state,
			pushed_at,
		}
	}
}

/// What a consumer of the state stream observes.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
	Update(StateUpdate),
	/// No further state updates follow for this operation.
	Completed,
}

impl StateEvent {
	pub fn is_completed(&self) -> bool {
		matches!(self, StateEvent::Completed)
	}
}

/// Diagnostic attached to a log line (Terraform `diagnostic` object).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
	#[serde(default)]
	pub severity: String,
	#[serde(default)]
	pub summary: String,
	#[serde(default)]
	pub detail: String,
}

/// One log record from the provisioning run.
///
/// Deserializes from either plain keys or Terraform's machine-readable
/// (`-json`) keys: `@level`, `@timestamp`, `@message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
	#[serde(alias = "@level")]
	pub level: String,
	#[serde(alias = "@timestamp")]
	pub timestamp: String,
	#[serde(alias = "@message")]
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub diagnostic: Option<Diagnostic>,
}

impl LogLine {
	pub fn new(
		level: impl Into<String>,
		timestamp: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self {
			level: level.into(),
			timestamp: timestamp.into(),
			message: message.into(),
			diagnostic: None,
		}
	}

	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self
			.diagnostic
			.get_or_insert_with(Diagnostic::default)
			.detail = detail.into();
		self
	}

	pub fn detail(&self) -> Option<&str> {
		self
			.diagnostic
			.as_ref()
			.map(|d| d.detail.as_str())
			.filter(|d| !d.is_empty())
	}

	/// Render the record as the single display line stored on the logs stream.
	pub fn format_line(&self) -> String {
		match self.detail() {
			Some(detail) => format!(
				"[{}] [{}] {}: {}",
				self.level, self.timestamp, self.message, detail
			),
			None => format!("[{}] [{}] {}", self.level, self.timestamp, self.message),
		}
	}
}
