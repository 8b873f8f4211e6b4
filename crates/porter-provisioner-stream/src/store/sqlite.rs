// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! SQLite-backed stream store.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use porter_provisioner_core::{EntryId, Fields, StreamEntry};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use tokio::sync::watch;

use super::{now_millis, ReadOptions, StreamStore};
use crate::error::StoreError;

/// Default interval at which blocked readers re-poll for appends made by other processes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./porter-streams.db")
///
/// # Errors
/// Returns `StoreError::Internal` if the URL is invalid or `StoreError::Database`
/// if the connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, StoreError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| StoreError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.busy_timeout(Duration::from_secs(5))
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("stream database pool created");
	Ok(pool)
}

/// Create the stream tables if they do not exist.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS stream_entries (
			stream TEXT NOT NULL,
			ms INTEGER NOT NULL,
			seq INTEGER NOT NULL,
			created_at TEXT NOT NULL,
			PRIMARY KEY (stream, ms, seq)
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS stream_entry_fields (
			stream TEXT NOT NULL,
			ms INTEGER NOT NULL,
			seq INTEGER NOT NULL,
			name TEXT NOT NULL,
			value BLOB NOT NULL,
			PRIMARY KEY (stream, ms, seq, name),
			FOREIGN KEY (stream, ms, seq) REFERENCES stream_entries(stream, ms, seq) ON DELETE CASCADE
		)
		"#,
	)
	.execute(pool)
	.await?;

	tracing::debug!("stream tables ready");
	Ok(())
}

/// A [`StreamStore`] persisted in SQLite.
///
/// Id assignment happens inside a single `INSERT … SELECT` so concurrent
/// appenders (in this or another process) cannot be handed the same id.
/// Readers in this process are woken immediately on append; appends from other
/// processes are picked up on the next poll.
pub struct SqliteStreamStore {
	pool: SqlitePool,
	poll_interval: Duration,
	changed: watch::Sender<u64>,
}

impl SqliteStreamStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self::with_poll_interval(pool, DEFAULT_POLL_INTERVAL)
	}

	pub fn with_poll_interval(pool: SqlitePool, poll_interval: Duration) -> Self {
		let (changed, _) = watch::channel(0);
		Self {
			pool,
			poll_interval,
			changed,
		}
	}

	/// Open `database_url`, create the tables and return a ready store.
	pub async fn connect(database_url: &str, poll_interval: Duration) -> Result<Self, StoreError> {
		let pool = create_pool(database_url).await?;
		run_migrations(&pool).await?;
		Ok(Self::with_poll_interval(pool, poll_interval))
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	async fn fetch(
		&self,
		stream: &str,
		after: EntryId,
		count: Option<usize>,
	) -> Result<Vec<StreamEntry>, StoreError> {
		let after_ms = to_sql(after.millis)?;
		let after_seq = to_sql(after.seq)?;
		// SQLite treats a negative LIMIT as unbounded.
		let limit = match count {
			Some(n) => i64::try_from(n).unwrap_or(i64::MAX),
			None => -1,
		};

		let rows = sqlx::query_as::<_, (i64, i64, Option<String>, Option<Vec<u8>>)>(
			r#"
			SELECT e.ms, e.seq, f.name, f.value
			FROM (
				SELECT ms, seq FROM stream_entries
				WHERE stream = ?1 AND (ms > ?2 OR (ms = ?2 AND seq > ?3))
				ORDER BY ms, seq
				LIMIT ?4
			) AS e
			LEFT JOIN stream_entry_fields AS f
				ON f.stream = ?1 AND f.ms = e.ms AND f.seq = e.seq
			ORDER BY e.ms, e.seq, f.name
			"#,
		)
		.bind(stream)
		.bind(after_ms)
		.bind(after_seq)
		.bind(limit)
		.fetch_all(&self.pool)
		.await?;

		let mut entries: Vec<StreamEntry> = Vec::new();
		for (ms, seq, name, value) in rows {
			let id = EntryId::new(from_sql(ms)?, from_sql(seq)?);
			if entries.last().map(|e| e.id) != Some(id) {
				entries.push(StreamEntry::new(id, Fields::new()));
			}
			if let (Some(name), Some(value), Some(entry)) = (name, value, entries.last_mut()) {
				entry.fields.insert(name, Bytes::from(value));
			}
		}
		Ok(entries)
	}
}

#[async_trait]
impl StreamStore for SqliteStreamStore {
	#[tracing::instrument(skip(self, fields), fields(field_count = fields.len()))]
	async fn append(&self, stream: &str, fields: Fields) -> Result<EntryId, StoreError> {
		let now = to_sql(now_millis().max(1))?;
		let created_at = chrono::Utc::now().to_rfc3339();

		let mut tx = self.pool.begin().await?;

		let (ms, seq) = sqlx::query_as::<_, (i64, i64)>(
			r#"
			INSERT INTO stream_entries (stream, ms, seq, created_at)
			SELECT ?1,
				CASE WHEN last.ms IS NULL OR ?2 > last.ms THEN ?2 ELSE last.ms END,
				CASE WHEN last.ms IS NULL OR ?2 > last.ms THEN 0 ELSE last.seq + 1 END,
				?3
			FROM (SELECT 1) AS seed
			LEFT JOIN (
				SELECT ms, seq FROM stream_entries
				WHERE stream = ?1
				ORDER BY ms DESC, seq DESC
				LIMIT 1
			) AS last ON 1
			RETURNING ms, seq
			"#,
		)
		.bind(stream)
		.bind(now)
		.bind(&created_at)
		.fetch_one(&mut *tx)
		.await?;

		for (name, value) in &fields {
			sqlx::query(
				"INSERT INTO stream_entry_fields (stream, ms, seq, name, value) VALUES (?, ?, ?, ?, ?)",
			)
			.bind(stream)
			.bind(ms)
			.bind(seq)
			.bind(name)
			.bind(value.as_ref())
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		let id = EntryId::new(from_sql(ms)?, from_sql(seq)?);
		self.changed.send_modify(|n| *n = n.wrapping_add(1));
		tracing::trace!(entry_id = %id, "appended entry");
		Ok(id)
	}

	async fn read_since(
		&self,
		stream: &str,
		after: EntryId,
		options: ReadOptions,
	) -> Result<Vec<StreamEntry>, StoreError> {
		loop {
			let mut rx = self.changed.subscribe();
			let batch = self.fetch(stream, after, options.count).await?;
			if !batch.is_empty() || !options.block {
				return Ok(batch);
			}
			// Either a local append or the poll interval elapsing triggers a re-read.
			let _ = tokio::time::timeout(self.poll_interval, rx.changed()).await;
		}
	}

	#[tracing::instrument(skip(self))]
	async fn len(&self, stream: &str) -> Result<u64, StoreError> {
		let (count,) =
			sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM stream_entries WHERE stream = ?")
				.bind(stream)
				.fetch_one(&self.pool)
				.await?;
		from_sql(count)
	}
}

fn to_sql(value: u64) -> Result<i64, StoreError> {
	i64::try_from(value).map_err(|_| StoreError::InvalidEntryId(value.to_string()))
}

fn from_sql(value: i64) -> Result<u64, StoreError> {
	u64::try_from(value).map_err(|_| StoreError::InvalidEntryId(value.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use tempfile::tempdir;
	use tokio::time::timeout;

	async fn create_test_store(dir: &tempfile::TempDir) -> SqliteStreamStore {
		let db_path = dir.path().join("streams.db");
		let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
		SqliteStreamStore::connect(&db_url, Duration::from_millis(20))
			.await
			.unwrap()
	}

	fn fields(pairs: &[(&str, &[u8])]) -> Fields {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), Bytes::copy_from_slice(v)))
			.collect()
	}

	#[tokio::test]
	async fn test_append_and_read_back_fields() {
		let dir = tempdir().unwrap();
		let store = create_test_store(&dir).await;

		let id = store
			.append("s", fields(&[("id", b"ws"), ("data", b"{}")]))
			.await
			.unwrap();
		assert!(id > EntryId::ZERO);

		let batch = store
			.read_since("s", EntryId::ZERO, ReadOptions::poll(None))
			.await
			.unwrap();
		assert_eq!(batch.len(), 1);
		assert_eq!(batch[0].id, id);
		assert_eq!(batch[0].fields["id"].as_ref(), b"ws");
		assert_eq!(batch[0].fields["data"].as_ref(), b"{}");
	}

	#[tokio::test]
	async fn test_ids_increase_and_offsets_resume() {
		let dir = tempdir().unwrap();
		let store = create_test_store(&dir).await;

		let mut ids = Vec::new();
		for i in 0..20u8 {
			ids.push(store.append("s", fields(&[("n", &[i])])).await.unwrap());
		}
		assert!(ids.windows(2).all(|w| w[0] < w[1]));

		let tail = store
			.read_since("s", ids[9], ReadOptions::poll(None))
			.await
			.unwrap();
		assert_eq!(tail.len(), 10);
		assert_eq!(tail[0].id, ids[10]);

		let limited = store
			.read_since("s", EntryId::ZERO, ReadOptions::poll(Some(3)))
			.await
			.unwrap();
		assert_eq!(limited.len(), 3);
		assert_eq!(store.len("s").await.unwrap(), 20);
	}

	#[tokio::test]
	async fn test_entry_without_fields() {
		let dir = tempdir().unwrap();
		let store = create_test_store(&dir).await;

		store.append("s", Fields::new()).await.unwrap();
		let batch = store
			.read_since("s", EntryId::ZERO, ReadOptions::poll(None))
			.await
			.unwrap();
		assert_eq!(batch.len(), 1);
		assert!(batch[0].fields.is_empty());
	}

	#[tokio::test]
	async fn test_concurrent_appends_get_distinct_ids() {
		let dir = tempdir().unwrap();
		let store = Arc::new(create_test_store(&dir).await);

		let mut handles = Vec::new();
		for i in 0..8u8 {
			let store = Arc::clone(&store);
			handles.push(tokio::spawn(async move {
				store.append("s", fields(&[("n", &[i])])).await.unwrap()
			}));
		}
		let mut ids = Vec::new();
		for handle in handles {
			ids.push(handle.await.unwrap());
		}
		ids.sort();
		ids.dedup();
		assert_eq!(ids.len(), 8);
	}

	#[tokio::test]
	async fn test_blocking_read_wakes_on_append() {
		let dir = tempdir().unwrap();
		let store = Arc::new(create_test_store(&dir).await);

		let reader = Arc::clone(&store);
		let handle = tokio::spawn(async move {
			reader
				.read_since("s", EntryId::ZERO, ReadOptions::blocking(None))
				.await
		});

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert!(!handle.is_finished());

		store.append("s", fields(&[("v", b"x")])).await.unwrap();
		let batch = timeout(Duration::from_secs(2), handle)
			.await
			.unwrap()
			.unwrap()
			.unwrap();
		assert_eq!(batch.len(), 1);
	}

	#[tokio::test]
	async fn test_reader_sees_appends_from_another_pool() {
		let dir = tempdir().unwrap();
		let store = Arc::new(create_test_store(&dir).await);
		let other_writer = create_test_store(&dir).await;

		let reader = Arc::clone(&store);
		let handle = tokio::spawn(async move {
			reader
				.read_since("s", EntryId::ZERO, ReadOptions::blocking(None))
				.await
		});

		tokio::time::sleep(Duration::from_millis(30)).await;
		other_writer
			.append("s", fields(&[("v", b"remote")]))
			.await
			.unwrap();

		let batch = timeout(Duration::from_secs(2), handle)
			.await
			.unwrap()
			.unwrap()
			.unwrap();
		assert_eq!(batch[0].fields["v"].as_ref(), b"remote");
	}
}
