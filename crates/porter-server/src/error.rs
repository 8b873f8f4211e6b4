// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Server error types and HTTP response conversions.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use porter_provisioner_core::{EntryIdError, IdentityError};
use porter_provisioner_stream::{StoreError, StreamError};
use serde::{Deserialize, Serialize};

/// Server error types for operation stream endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	/// Path segment is not a usable workspace id.
	#[error("Invalid workspace id: {0}")]
	InvalidWorkspace(#[from] IdentityError),

	/// Resume offset could not be parsed.
	#[error("Invalid entry id: {0}")]
	InvalidEntryId(#[from] EntryIdError),

	/// Stream store or payload encoding failed.
	#[error("Stream error: {0}")]
	Stream(#[from] StreamError),

	/// Store could not be opened.
	#[error("Store error: {0}")]
	Store(#[from] StoreError),
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, error_response) = match &self {
			ServerError::InvalidWorkspace(e) => (
				StatusCode::BAD_REQUEST,
				ErrorResponse {
					error: "invalid_workspace_id".to_string(),
					message: e.to_string(),
				},
			),
			ServerError::InvalidEntryId(e) => (
				StatusCode::BAD_REQUEST,
				ErrorResponse {
					error: "invalid_entry_id".to_string(),
					message: e.to_string(),
				},
			),
			ServerError::Stream(StreamError::Serialization(e)) => {
				tracing::error!(error = %e, "failed to encode stream payload");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					ErrorResponse {
						error: "serialization_error".to_string(),
						message: "Failed to encode stream payload".to_string(),
					},
				)
			}
			ServerError::Stream(e) => {
				tracing::error!(error = %e, "stream store error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					ErrorResponse {
						error: "store_error".to_string(),
						message: "A stream store error occurred".to_string(),
					},
				)
			}
			ServerError::Store(e) => {
				tracing::error!(error = %e, "stream store error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					ErrorResponse {
						error: "store_error".to_string(),
						message: "A stream store error occurred".to_string(),
					},
				)
			}
		};

		(status, Json(error_response)).into_response()
	}
}

/// Sink failure raised when an SSE client has gone away.
#[derive(Debug, thiserror::Error)]
#[error("client disconnected")]
pub struct ClientDisconnected;
