// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Operation stream endpoints.
//!
//! The provisioner worker appends through the POST routes; dashboards follow
//! an operation through the SSE routes:
//! - POST /api/workspaces/{workspace_id}/state - Append a resource state update
//! - POST /api/workspaces/{workspace_id}/logs - Append a log line
//! - POST /api/workspaces/{workspace_id}/completed - Append the completion marker
//! - GET /api/workspaces/{workspace_id}/state/stream - SSE of state updates, ends after completion
//! - GET /api/workspaces/{workspace_id}/logs/stream - SSE of formatted log lines
//!
//! Stream endpoints resume after the id in the `Last-Event-ID` header, or the
//! `after` query parameter when the header is absent.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use axum::{
	extract::{Path, Query, State},
	http::HeaderMap,
	response::sse::{Event, KeepAlive, Sse},
	Json,
};
use futures::stream::Stream;
use porter_provisioner_core::{
	wire, EntryId, EntryIdError, LogLine, ResourceState, StateEvent, WorkspaceId,
};
use porter_provisioner_stream::{Delivery, OperationHandle, SinkError, StreamError, TailOptions};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::error::{ClientDisconnected, ServerError};

const LAST_EVENT_ID: &str = "last-event-id";
const SSE_CHANNEL_CAPACITY: usize = 32;
/// Largest id component every stream backend can address.
const MAX_ID_COMPONENT: u64 = i64::MAX as u64;

type EventSender = mpsc::Sender<Result<Event, Infallible>>;

/// Query parameters for the stream endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
	/// Deliver entries strictly after this id (`<millis>-<seq>`).
	pub after: Option<String>,
}

/// Response for the append endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppendResponse {
	pub id: EntryId,
}

fn operation(state: &AppState, workspace_id: String) -> Result<OperationHandle, ServerError> {
	Ok(state.streams.workspace(WorkspaceId::parse(workspace_id)?))
}

fn resume_offset(headers: &HeaderMap, params: &StreamParams) -> Result<EntryId, ServerError> {
	let header = headers
		.get(LAST_EVENT_ID)
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty());

	let Some(raw) = header.or(params.after.as_deref()) else {
		return Ok(EntryId::ZERO);
	};
	let id: EntryId = raw.parse()?;
	if id.millis > MAX_ID_COMPONENT || id.seq > MAX_ID_COMPONENT {
		return Err(EntryIdError::OutOfRange(raw.to_string()).into());
	}
	Ok(id)
}

/// POST /api/workspaces/{workspace_id}/state - Append a resource state update.
#[tracing::instrument(skip(state, resource))]
pub async fn push_state(
	State(state): State<AppState>,
	Path(workspace_id): Path<String>,
	Json(resource): Json<ResourceState>,
) -> Result<Json<AppendResponse>, ServerError> {
	let handle = operation(&state, workspace_id)?;
	let id = handle.push_state_update(resource).await?;
	Ok(Json(AppendResponse { id }))
}

/// POST /api/workspaces/{workspace_id}/logs - Append a log line.
#[tracing::instrument(skip(state, line))]
pub async fn push_log(
	State(state): State<AppState>,
	Path(workspace_id): Path<String>,
	Json(line): Json<LogLine>,
) -> Result<Json<AppendResponse>, ServerError> {
	let handle = operation(&state, workspace_id)?;
	let id = handle.push_log_line(&line).await?;
	Ok(Json(AppendResponse { id }))
}

/// POST /api/workspaces/{workspace_id}/completed - Append the completion marker.
#[tracing::instrument(skip(state))]
pub async fn signal_completed(
	State(state): State<AppState>,
	Path(workspace_id): Path<String>,
) -> Result<Json<AppendResponse>, ServerError> {
	let handle = operation(&state, workspace_id)?;
	let id = handle.signal_completed().await?;
	Ok(Json(AppendResponse { id }))
}

/// GET /api/workspaces/{workspace_id}/state/stream - SSE of state updates.
#[tracing::instrument(skip(state, params, headers))]
pub async fn stream_state(
	State(state): State<AppState>,
	Path(workspace_id): Path<String>,
	Query(params): Query<StreamParams>,
	headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
	let handle = operation(&state, workspace_id)?;
	let start = resume_offset(&headers, &params)?;
	let cancel = state.shutdown.child_token();
	let (tx, rx) = mpsc::channel(SSE_CHANNEL_CAPACITY);

	tokio::spawn(async move {
		let tail = handle.stream_state_updates(TailOptions::after(start), &cancel, |delivery| {
			let completed = delivery.record.is_completed();
			let event = state_event(&delivery);
			let (tx, cancel) = (tx.clone(), cancel.clone());
			async move {
				deliver(&tx, &cancel, event?).await?;
				if completed {
					cancel.cancel();
				}
				Ok::<(), SinkError>(())
			}
		});
		run_tail(handle.workspace_id(), "state", &tx, tail).await;
	});

	Ok(sse(rx, state.keep_alive))
}

/// GET /api/workspaces/{workspace_id}/logs/stream - SSE of formatted log lines.
#[tracing::instrument(skip(state, params, headers))]
pub async fn stream_logs(
	State(state): State<AppState>,
	Path(workspace_id): Path<String>,
	Query(params): Query<StreamParams>,
	headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
	let handle = operation(&state, workspace_id)?;
	let start = resume_offset(&headers, &params)?;
	let cancel = state.shutdown.child_token();
	let (tx, rx) = mpsc::channel(SSE_CHANNEL_CAPACITY);

	tokio::spawn(async move {
		let tail = handle.stream_log_lines(TailOptions::after(start), &cancel, |delivery| {
			let event = log_event(&delivery);
			let (tx, cancel) = (tx.clone(), cancel.clone());
			async move { deliver(&tx, &cancel, event).await }
		});
		run_tail(handle.workspace_id(), "logs", &tx, tail).await;
	});

	Ok(sse(rx, state.keep_alive))
}

fn state_event(delivery: &Delivery<StateEvent>) -> Result<Event, serde_json::Error> {
	let event = Event::default().id(delivery.id.to_string());
	Ok(match &delivery.record {
		StateEvent::Update(update) => event.event("state").data(serde_json::to_string(update)?),
		StateEvent::Completed => event
			.event("completed")
			.data(serde_json::json!({ "status": wire::OPERATION_COMPLETED }).to_string()),
	})
}

fn log_event(delivery: &Delivery<String>) -> Event {
	// SSE cannot carry carriage returns.
	Event::default()
		.id(delivery.id.to_string())
		.event("log")
		.data(delivery.record.replace('\r', ""))
}

fn sse(
	rx: mpsc::Receiver<Result<Event, Infallible>>,
	keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
	Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"))
}

/// Queue one event for the SSE body. Cancellation drops the event instead of
/// waiting on a client that stopped reading.
async fn deliver(
	tx: &EventSender,
	cancel: &CancellationToken,
	event: Event,
) -> Result<(), SinkError> {
	tokio::select! {
		sent = tx.send(Ok(event)) => sent.map_err(|_| SinkError::from(ClientDisconnected)),
		_ = cancel.cancelled() => Ok(()),
	}
}

/// Drive `tail` until it returns or the client drops the response body.
async fn run_tail<F>(
	workspace_id: &WorkspaceId,
	stream: &'static str,
	tx: &EventSender,
	tail: F,
) where
	F: Future<Output = Result<(), StreamError>>,
{
	tokio::select! {
		result = tail => finish_tail(workspace_id, stream, result),
		_ = tx.closed() => tracing::debug!(%workspace_id, stream, "client disconnected, tail dropped"),
	}
}

fn finish_tail(workspace_id: &WorkspaceId, stream: &'static str, result: Result<(), StreamError>) {
	match result {
		Ok(()) => tracing::debug!(%workspace_id, stream, "tail finished"),
		Err(StreamError::Sink { id, source }) => {
			tracing::debug!(%workspace_id, stream, entry_id = %id, reason = %source, "tail ended by sink")
		}
		Err(e) => tracing::warn!(%workspace_id, stream, error = %e, "tail aborted"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	#[test]
	fn test_resume_offset_defaults_to_zero() {
		let offset = resume_offset(&HeaderMap::new(), &StreamParams::default()).unwrap();
		assert_eq!(offset, EntryId::ZERO);
	}

	#[test]
	fn test_resume_offset_prefers_last_event_id() {
		let mut headers = HeaderMap::new();
		headers.insert(LAST_EVENT_ID, HeaderValue::from_static("5-1"));
		let params = StreamParams {
			after: Some("3-0".to_string()),
		};
		assert_eq!(resume_offset(&headers, &params).unwrap(), EntryId::new(5, 1));
		assert_eq!(
			resume_offset(&HeaderMap::new(), &params).unwrap(),
			EntryId::new(3, 0)
		);
	}

	#[test]
	fn test_resume_offset_rejects_garbage() {
		let params = StreamParams {
			after: Some("yesterday".to_string()),
		};
		assert!(matches!(
			resume_offset(&HeaderMap::new(), &params),
			Err(ServerError::InvalidEntryId(_))
		));
	}

	#[test]
	fn test_resume_offset_rejects_ids_beyond_store_range() {
		let params = StreamParams {
			after: Some(format!("{}-0", u64::MAX)),
		};
		assert!(matches!(
			resume_offset(&HeaderMap::new(), &params),
			Err(ServerError::InvalidEntryId(EntryIdError::OutOfRange(_)))
		));

		let mut headers = HeaderMap::new();
		headers.insert(
			LAST_EVENT_ID,
			HeaderValue::from_str(&format!("1-{}", MAX_ID_COMPONENT + 1)).unwrap(),
		);
		assert!(resume_offset(&headers, &StreamParams::default()).is_err());

		let params = StreamParams {
			after: Some(format!("{MAX_ID_COMPONENT}-{MAX_ID_COMPONENT}")),
		};
		assert_eq!(
			resume_offset(&HeaderMap::new(), &params).unwrap(),
			EntryId::new(MAX_ID_COMPONENT, MAX_ID_COMPONENT)
		);
	}

	#[tokio::test]
	async fn test_deliver_gives_up_on_full_channel_once_cancelled() {
		let (tx, _rx) = mpsc::channel(1);
		let cancel = CancellationToken::new();
		deliver(&tx, &cancel, Event::default().data("first")).await.unwrap();

		cancel.cancel();
		let result = tokio::time::timeout(
			Duration::from_secs(1),
			deliver(&tx, &cancel, Event::default().data("second")),
		)
		.await;
		assert!(matches!(result, Ok(Ok(()))));
	}

	#[tokio::test]
	async fn test_deliver_reports_dropped_receiver() {
		let (tx, rx) = mpsc::channel(1);
		drop(rx);
		let result = deliver(&tx, &CancellationToken::new(), Event::default().data("x")).await;
		assert!(result.unwrap_err().is::<ClientDisconnected>());
	}
}
