// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Resolved identity of a provisioning run.
//!
//! Infra and operation records are owned by the control plane's database; this
//! module only carries the fields needed to derive a [`WorkspaceId`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Kind of infrastructure being provisioned (e.g. `eks`, `rds`, `ecr`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InfraKind(String);

impl InfraKind {
	pub fn new(kind: impl Into<String>) -> Result<Self, IdentityError> {
		let kind = kind.into();
		let valid = !kind.is_empty()
			&& kind
				.chars()
				.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
		if !valid {
			return Err(IdentityError::InvalidKind(kind));
		}
		Ok(Self(kind))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl TryFrom<String> for InfraKind {
	type Error = IdentityError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<InfraKind> for String {
	fn from(kind: InfraKind) -> Self {
		kind.0
	}
}

impl fmt::Display for InfraKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// An infrastructure record, already resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraRecord {
	pub id: u64,
	pub project_id: u64,
	pub kind: InfraKind,
	suffix: String,
}

impl InfraRecord {
	pub fn new(
		id: u64,
		project_id: u64,
		kind: InfraKind,
		suffix: impl Into<String>,
	) -> Result<Self, IdentityError> {
		let suffix = suffix.into();
		let valid = !suffix.is_empty()
			&& suffix
				.chars()
				.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
		if !valid {
			return Err(IdentityError::InvalidSuffix(suffix));
		}
		Ok(Self {
			id,
			project_id,
			kind,
			suffix,
		})
	}

	pub fn suffix(&self) -> &str {
		&self.suffix
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
	Apply,
	Destroy,
	Retry,
}

impl OperationKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			OperationKind::Apply => "apply",
			OperationKind::Destroy => "destroy",
			OperationKind::Retry => "retry",
		}
	}
}

impl std::str::FromStr for OperationKind {
	type Err = IdentityError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"apply" => Ok(OperationKind::Apply),
			"destroy" => Ok(OperationKind::Destroy),
			"retry" => Ok(OperationKind::Retry),
			_ => Err(IdentityError::UnknownOperationKind(s.to_string())),
		}
	}
}

/// One provisioning or deprovisioning run against an [`InfraRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
	uid: String,
	pub kind: OperationKind,
}

impl OperationRecord {
	pub fn new(uid: impl Into<String>, kind: OperationKind) -> Result<Self, IdentityError> {
		let uid = uid.into();
		if !is_id_safe(&uid) {
			return Err(IdentityError::InvalidOperationUid(uid));
		}
		Ok(Self { uid, kind })
	}

	pub fn uid(&self) -> &str {
		&self.uid
	}
}

/// Deterministic key for one operation's stream namespace.
///
/// Derived ids have the shape `{kind}-{project_id}-{infra_id}-{suffix}-{operation_uid}`.
/// Neither `kind` nor `suffix` may contain `-` and both ids are decimal, so the
/// derivation is injective.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceId(String);

impl WorkspaceId {
	pub fn derive(infra: &InfraRecord, operation: &OperationRecord) -> Self {
		Self(format!(
			"{}-{}-{}-{}-{}",
			infra.kind,
			infra.project_id,
			infra.id,
			infra.suffix(),
			operation.uid()
		))
	}

	/// Accept a workspace id computed elsewhere (e.g. from a request path).
	pub fn parse(raw: impl Into<String>) -> Result<Self, IdentityError> {
		let raw = raw.into();
		if !is_id_safe(&raw) {
			return Err(IdentityError::InvalidWorkspaceId(raw));
		}
		Ok(Self(raw))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl TryFrom<String> for WorkspaceId {
	type Error = IdentityError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}

impl From<WorkspaceId> for String {
	fn from(id: WorkspaceId) -> Self {
		id.0
	}
}

impl fmt::Display for WorkspaceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

fn is_id_safe(s: &str) -> bool {
	!s.is_empty()
		&& s
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
