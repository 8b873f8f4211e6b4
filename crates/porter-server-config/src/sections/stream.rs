// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stream store configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const DEFAULT_DATABASE_URL: &str = "sqlite:./porter-streams.db?mode=rwc";
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_READ_BATCH_SIZE: usize = 100;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;

/// Which store backs the operation streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamBackend {
	/// Process-local; streams are lost on restart.
	Memory,
	#[default]
	Sqlite,
}

impl fmt::Display for StreamBackend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StreamBackend::Memory => write!(f, "memory"),
			StreamBackend::Sqlite => write!(f, "sqlite"),
		}
	}
}

impl FromStr for StreamBackend {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"memory" => Ok(StreamBackend::Memory),
			"sqlite" => Ok(StreamBackend::Sqlite),
			other => Err(format!("unknown stream backend '{other}'")),
		}
	}
}

/// Stream configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
	pub backend: StreamBackend,
	pub database_url: String,
	/// How often a blocked SQLite reader re-polls for appends from other processes.
	pub poll_interval_ms: u64,
	pub read_batch_size: usize,
	/// Interval between SSE keep-alive comments.
	pub keep_alive_secs: u64,
}

impl Default for StreamConfig {
	fn default() -> Self {
		StreamConfigLayer::default().finalize()
	}
}

/// Stream configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamConfigLayer {
	pub backend: Option<StreamBackend>,
	pub database_url: Option<String>,
	pub poll_interval_ms: Option<u64>,
	pub read_batch_size: Option<usize>,
	pub keep_alive_secs: Option<u64>,
}

impl StreamConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.backend.is_some() {
			self.backend = other.backend;
		}
		if other.database_url.is_some() {
			self.database_url = other.database_url;
		}
		if other.poll_interval_ms.is_some() {
			self.poll_interval_ms = other.poll_interval_ms;
		}
		if other.read_batch_size.is_some() {
			self.read_batch_size = other.read_batch_size;
		}
		if other.keep_alive_secs.is_some() {
			self.keep_alive_secs = other.keep_alive_secs;
		}
	}

	pub fn finalize(self) -> StreamConfig {
		StreamConfig {
			backend: self.backend.unwrap_or_default(),
			database_url: self
				.database_url
				.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
			poll_interval_ms: self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
			read_batch_size: self.read_batch_size.unwrap_or(DEFAULT_READ_BATCH_SIZE),
			keep_alive_secs: self.keep_alive_secs.unwrap_or(DEFAULT_KEEP_ALIVE_SECS),
		}
	}
}
