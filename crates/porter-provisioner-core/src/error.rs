// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

/// Errors raised while constructing infra, operation or workspace identities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
	#[error("infra kind must be a non-empty lowercase slug without dashes, got '{0}'")]
	InvalidKind(String),

	#[error("infra suffix must be non-empty lowercase alphanumeric, got '{0}'")]
	InvalidSuffix(String),

	#[error("operation uid must be non-empty and contain only [A-Za-z0-9_-], got '{0}'")]
	InvalidOperationUid(String),

	#[error("workspace id must be non-empty and contain only [A-Za-z0-9_-], got '{0}'")]
	InvalidWorkspaceId(String),

	#[error("unknown operation kind: {0}")]
	UnknownOperationKind(String),
}

/// Errors raised while parsing a stream entry id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryIdError {
	#[error("entry id '{0}' is not of the form <millis>-<seq>")]
	Malformed(String),

	#[error("entry id '{0}' has a non-numeric component")]
	NotNumeric(String),

	#[error("entry id '{0}' is outside the range a stream store can hold")]
	OutOfRange(String),
}
