// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Provisioner operation streams.
//!
//! A provisioning worker appends resource state updates and log lines to two
//! append-only streams per operation; status watchers tail those streams from
//! an offset and follow the live end until cancelled.
//!
//! This crate provides:
//! - [`StreamStore`] - the append / blocking-read boundary, with
//!   [`MemoryStreamStore`] and [`SqliteStreamStore`] implementations
//! - [`ProvisionerStreams`] / [`OperationHandle`] - typed producer and consumer API
//! - [`StreamError`] - failures surfaced to producers and tail callers
//!
//! # Usage
//!
//! ```ignore
//! use porter_provisioner_stream::{MemoryStreamStore, ProvisionerStreams, TailOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let streams = ProvisionerStreams::new(Arc::new(MemoryStreamStore::new()));
//! let op = streams.operation(&infra, &operation);
//! op.push_log_line(&line).await?;
//!
//! let cancel = CancellationToken::new();
//! op.stream_log_lines(TailOptions::default(), &cancel, |d| async move {
//!     println!("{}", d.record);
//!     Ok(())
//! })
//! .await?;
//! ```

pub mod error;
pub mod producer;
pub mod store;
pub mod tail;

pub use error::{SinkError, StoreError, StreamError};
pub use producer::{OperationHandle, ProvisionerStreams};
pub use store::{MemoryStreamStore, ReadOptions, SqliteStreamStore, StreamStore};
pub use tail::{tail, Delivery, TailOptions};
