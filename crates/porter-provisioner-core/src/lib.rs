// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Core types for provisioner operation streams.
//!
//! This crate provides:
//! - [`InfraRecord`] / [`OperationRecord`] - resolved identity of one provisioning run
//! - [`WorkspaceId`] / [`OperationStreams`] - deterministic stream naming per operation
//! - [`EntryId`] / [`StreamEntry`] - ordered entries on the stream store boundary
//! - [`ResourceState`], [`StateUpdate`], [`StateEvent`], [`LogLine`] - typed records
//! - [`wire`] - field layout used to encode records into stream entries

pub mod entry;
pub mod error;
pub mod identity;
pub mod naming;
pub mod record;
pub mod wire;

pub use entry::{EntryId, Fields, StreamEntry};
pub use error::{EntryIdError, IdentityError};
pub use identity::{InfraKind, InfraRecord, OperationKind, OperationRecord, WorkspaceId};
pub use naming::OperationStreams;
pub use record::{Diagnostic, LogLine, ResourceState, StateEvent, StateUpdate};
pub use wire::DecodeSkip;
