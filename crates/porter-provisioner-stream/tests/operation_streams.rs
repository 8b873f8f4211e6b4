// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! End-to-end behaviour of producers and tails against real stores.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use porter_provisioner_core::{
	wire, EntryId, Fields, InfraKind, InfraRecord, LogLine, OperationKind, OperationRecord,
	ResourceState, StateEvent,
};
use porter_provisioner_stream::{
	Delivery, MemoryStreamStore, OperationHandle, ProvisionerStreams, SinkError,
	SqliteStreamStore, StreamError, StreamStore, TailOptions,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn infra() -> InfraRecord {
	InfraRecord::new(42, 7, InfraKind::new("eks").unwrap(), "k3x9").unwrap()
}

fn operation(uid: &str) -> OperationRecord {
	OperationRecord::new(uid, OperationKind::Apply).unwrap()
}

fn memory_handle() -> (Arc<MemoryStreamStore>, OperationHandle) {
	let store = Arc::new(MemoryStreamStore::new());
	let handle = ProvisionerStreams::new(store.clone()).operation(&infra(), &operation("op1"));
	(store, handle)
}

fn resource(id: &str, n: u64) -> ResourceState {
	ResourceState::new(id, serde_json::json!({ "status": "created", "n": n }))
}

/// Tail the state stream until the completion marker arrives.
async fn collect_until_completed(
	handle: &OperationHandle,
	options: TailOptions,
) -> Vec<Delivery<StateEvent>> {
	let cancel = CancellationToken::new();
	let mut seen = Vec::new();
	timeout(
		Duration::from_secs(2),
		handle.stream_state_updates(options, &cancel, |d| {
			if d.record.is_completed() {
				cancel.cancel();
			}
			seen.push(d);
			std::future::ready(Ok::<_, SinkError>(()))
		}),
	)
	.await
	.expect("tail did not finish")
	.unwrap();
	seen
}

async fn collect_logs(handle: &OperationHandle, expected: usize) -> Vec<String> {
	let cancel = CancellationToken::new();
	let mut seen = Vec::new();
	timeout(
		Duration::from_secs(2),
		handle.stream_log_lines(TailOptions::default(), &cancel, |d| {
			seen.push(d.record);
			if seen.len() == expected {
				cancel.cancel();
			}
			std::future::ready(Ok::<_, SinkError>(()))
		}),
	)
	.await
	.expect("tail did not finish")
	.unwrap();
	seen
}

#[tokio::test]
async fn test_state_updates_observed_in_push_order_then_completion() {
	let (_store, handle) = memory_handle();
	for n in 0..25 {
		handle
			.push_state_update(resource(&format!("r{n}"), n))
			.await
			.unwrap();
	}
	handle.signal_completed().await.unwrap();

	let seen = collect_until_completed(&handle, TailOptions::default()).await;
	assert_eq!(seen.len(), 26);
	for (n, delivery) in seen.iter().take(25).enumerate() {
		match &delivery.record {
			StateEvent::Update(update) => {
				assert_eq!(update.resource_id, format!("r{n}"));
				assert_eq!(update.state["n"], n as u64);
			}
			StateEvent::Completed => panic!("completion marker delivered early"),
		}
	}
	assert_eq!(seen[25].record, StateEvent::Completed);
	assert!(seen.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
async fn test_replay_from_same_offset_is_identical() {
	let (_store, handle) = memory_handle();
	for n in 0..5 {
		handle.push_state_update(resource("r", n)).await.unwrap();
	}
	handle.signal_completed().await.unwrap();

	let full = collect_until_completed(&handle, TailOptions::default()).await;
	let resume_from = full[1].id;

	let first = collect_until_completed(&handle, TailOptions::after(resume_from)).await;
	let second = collect_until_completed(&handle, TailOptions::after(resume_from)).await;
	assert_eq!(first, second);
	assert_eq!(first.len(), 4);
	assert_eq!(first[..], full[2..]);
}

#[tokio::test]
async fn test_log_and_state_streams_are_independent() {
	let (store, handle) = memory_handle();
	handle.push_state_update(resource("r1", 1)).await.unwrap();
	for i in 0..10 {
		handle
			.push_log_line(&LogLine::new("INFO", "t", format!("line {i}")))
			.await
			.unwrap();
	}
	handle.push_state_update(resource("r2", 2)).await.unwrap();
	handle.signal_completed().await.unwrap();

	let states = collect_until_completed(&handle, TailOptions::default()).await;
	assert_eq!(states.len(), 3);

	let logs = collect_logs(&handle, 10).await;
	assert_eq!(logs[0], "[INFO] [t] line 0");
	assert_eq!(logs[9], "[INFO] [t] line 9");

	assert_eq!(
		store.len(&handle.streams().state_stream()).await.unwrap(),
		3
	);
	assert_eq!(store.len(&handle.streams().logs_stream()).await.unwrap(), 10);
}

#[tokio::test]
async fn test_operations_do_not_share_streams() {
	let store = Arc::new(MemoryStreamStore::new());
	let streams = ProvisionerStreams::new(store);
	let a = streams.operation(&infra(), &operation("a"));
	let b = streams.operation(&infra(), &operation("b"));

	a.push_state_update(resource("only-a", 0)).await.unwrap();
	a.signal_completed().await.unwrap();
	b.signal_completed().await.unwrap();

	let seen_b = collect_until_completed(&b, TailOptions::default()).await;
	assert_eq!(seen_b.len(), 1);
	assert_eq!(seen_b[0].record, StateEvent::Completed);
}

/// Skipping undecodable entries is deliberate: the tail favours liveness.
#[tokio::test]
async fn test_malformed_entry_is_skipped_not_fatal() {
	let (store, handle) = memory_handle();
	let state_stream = handle.streams().state_stream();

	handle.push_state_update(resource("before", 1)).await.unwrap();
	let mut junk = Fields::new();
	junk.insert(
		wire::FIELD_DATA.to_string(),
		Bytes::from_static(b"{not json"),
	);
	store.append(&state_stream, junk).await.unwrap();
	store.append(&state_stream, Fields::new()).await.unwrap();
	handle.push_state_update(resource("after", 2)).await.unwrap();
	handle.signal_completed().await.unwrap();

	let seen = collect_until_completed(&handle, TailOptions::default()).await;
	let ids: Vec<_> = seen
		.iter()
		.filter_map(|d| match &d.record {
			StateEvent::Update(u) => Some(u.resource_id.as_str()),
			StateEvent::Completed => None,
		})
		.collect();
	assert_eq!(ids, vec!["before", "after"]);
}

#[tokio::test]
async fn test_cancel_while_blocked_returns_ok_and_delivers_nothing_more() {
	let (_store, handle) = memory_handle();
	handle.push_log_line(&LogLine::new("INFO", "t", "first")).await.unwrap();

	let cancel = CancellationToken::new();
	let seen = Arc::new(Mutex::new(Vec::new()));

	let tail = {
		let handle = handle.clone();
		let cancel = cancel.clone();
		let seen = Arc::clone(&seen);
		tokio::spawn(async move {
			handle
				.stream_log_lines(TailOptions::default(), &cancel, move |d| {
					seen.lock().push(d.record);
					std::future::ready(Ok::<_, SinkError>(()))
				})
				.await
		})
	};

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(seen.lock().len(), 1);
	assert!(!tail.is_finished());

	cancel.cancel();
	let result = timeout(Duration::from_secs(1), tail)
		.await
		.expect("tail ignored cancellation")
		.unwrap();
	assert!(result.is_ok());

	handle.push_log_line(&LogLine::new("INFO", "t", "late")).await.unwrap();
	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(*seen.lock(), vec!["[INFO] [t] first".to_string()]);
}

#[derive(Debug)]
struct RejectedRecord(EntryId);

impl std::fmt::Display for RejectedRecord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "client went away at {}", self.0)
	}
}

impl std::error::Error for RejectedRecord {}

#[tokio::test]
async fn test_sink_failure_aborts_with_that_error() {
	let (_store, handle) = memory_handle();
	for n in 0..3 {
		handle.push_state_update(resource("r", n)).await.unwrap();
	}

	let cancel = CancellationToken::new();
	let mut delivered = 0;
	let err = timeout(
		Duration::from_secs(1),
		handle.stream_state_updates(TailOptions::default(), &cancel, |d| {
			let result: Result<(), SinkError> = if delivered == 1 {
				Err(Box::new(RejectedRecord(d.id)))
			} else {
				delivered += 1;
				Ok(())
			};
			std::future::ready(result)
		}),
	)
	.await
	.unwrap()
	.unwrap_err();

	assert_eq!(delivered, 1);
	match err {
		StreamError::Sink { id, source } => {
			let rejected = source.downcast_ref::<RejectedRecord>().unwrap();
			assert_eq!(rejected.0, id);
		}
		other => panic!("unexpected error: {other}"),
	}
}

#[tokio::test]
async fn test_worked_example() {
	let (_store, handle) = memory_handle();
	handle
		.push_state_update(ResourceState::new("r1", serde_json::json!({"arn": "x"})))
		.await
		.unwrap();
	handle
		.push_log_line(&LogLine::new("INFO", "t2", "applying"))
		.await
		.unwrap();
	handle.signal_completed().await.unwrap();

	let states = collect_until_completed(&handle, TailOptions::default()).await;
	assert_eq!(states.len(), 2);
	assert!(matches!(&states[0].record, StateEvent::Update(u) if u.resource_id == "r1"));
	assert_eq!(states[1].record, StateEvent::Completed);

	let logs = collect_logs(&handle, 1).await;
	assert_eq!(logs, vec!["[INFO] [t2] applying".to_string()]);
}

#[tokio::test]
async fn test_live_tail_follows_new_pushes() {
	let (_store, handle) = memory_handle();
	let reader = handle.clone();
	let tail = tokio::spawn(async move {
		collect_until_completed(&reader, TailOptions::default()).await
	});

	for n in 0..3 {
		tokio::time::sleep(Duration::from_millis(10)).await;
		handle.push_state_update(resource("r", n)).await.unwrap();
	}
	handle.signal_completed().await.unwrap();

	let seen = timeout(Duration::from_secs(2), tail).await.unwrap().unwrap();
	assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_sqlite_store_matches_memory_semantics() {
	let dir = tempfile::tempdir().unwrap();
	let db_url = format!("sqlite:{}?mode=rwc", dir.path().join("ops.db").display());
	let store: Arc<dyn StreamStore> = Arc::new(
		SqliteStreamStore::connect(&db_url, Duration::from_millis(20))
			.await
			.unwrap(),
	);
	let handle = ProvisionerStreams::new(store).operation(&infra(), &operation("sql"));

	handle.push_state_update(resource("r1", 1)).await.unwrap();
	handle
		.push_log_line(&LogLine::new("error", "t", "failed").with_detail("quota"))
		.await
		.unwrap();
	handle.push_state_update(resource("r2", 2)).await.unwrap();
	handle.signal_completed().await.unwrap();

	let states = collect_until_completed(&handle, TailOptions::default()).await;
	assert_eq!(states.len(), 3);
	assert!(matches!(&states[1].record, StateEvent::Update(u) if u.resource_id == "r2"));

	let logs = collect_logs(&handle, 1).await;
	assert_eq!(logs, vec!["[error] [t] failed: quota".to_string()]);
}
