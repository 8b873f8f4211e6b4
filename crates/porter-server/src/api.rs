// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Application state and router construction.

use std::sync::Arc;
use std::time::Duration;

use axum::{
	routing::{get, post},
	Router,
};
use porter_provisioner_stream::{
	MemoryStreamStore, ProvisionerStreams, SqliteStreamStore, StoreError, StreamStore,
};
use porter_server_config::{ServerConfig, StreamBackend, StreamConfig};
use tokio_util::sync::CancellationToken;

use crate::routes;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
	pub streams: ProvisionerStreams,
	/// Parent of every SSE tail; cancelled on shutdown.
	pub shutdown: CancellationToken,
	pub keep_alive: Duration,
}

impl AppState {
	pub fn new(store: Arc<dyn StreamStore>, config: &ServerConfig) -> Self {
		Self {
			streams: ProvisionerStreams::new(store).with_read_batch_size(config.stream.read_batch_size),
			shutdown: CancellationToken::new(),
			keep_alive: config.keep_alive(),
		}
	}
}

/// Open the stream store selected by `config.backend`.
pub async fn build_store(config: &StreamConfig) -> Result<Arc<dyn StreamStore>, StoreError> {
	match config.backend {
		StreamBackend::Memory => {
			tracing::warn!("using in-memory stream store; streams are lost on restart");
			Ok(Arc::new(MemoryStreamStore::new()))
		}
		StreamBackend::Sqlite => {
			let store = SqliteStreamStore::connect(
				&config.database_url,
				Duration::from_millis(config.poll_interval_ms),
			)
			.await?;
			Ok(Arc::new(store))
		}
	}
}

pub async fn create_app_state(config: &ServerConfig) -> Result<AppState, StoreError> {
	let store = build_store(&config.stream).await?;
	Ok(AppState::new(store, config))
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(routes::health::health_check))
		.route(
			"/api/workspaces/{workspace_id}/state",
			post(routes::operations::push_state),
		)
		.route(
			"/api/workspaces/{workspace_id}/logs",
			post(routes::operations::push_log),
		)
		.route(
			"/api/workspaces/{workspace_id}/completed",
			post(routes::operations::signal_completed),
		)
		.route(
			"/api/workspaces/{workspace_id}/state/stream",
			get(routes::operations::stream_state),
		)
		.route(
			"/api/workspaces/{workspace_id}/logs/stream",
			get(routes::operations::stream_logs),
		)
		.with_state(state)
}
